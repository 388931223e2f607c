use crate::errors::Result;
use nom::{
    IResult,
    bytes::complete::take,
    number::complete::{be_u8, be_u16, be_u24},
};

use super::{
    Identification, MessageVersion, Section0, Section2, Section3, Section4, check_length,
    parse_body, parse_section0, write_identification,
};

/// Edition 4: two-byte center fields and a four-digit year.
#[derive(Clone, Debug)]
pub struct BUFRMessageV4 {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

impl MessageVersion for BUFRMessageV4 {
    fn parse(input: &[u8]) -> Result<Self> {
        let (input, section0) = parse_section0(input)?;
        let (input, section1) = parse_section1(input)?;
        let (_input, (section2, section3, section4)) =
            parse_body(input, section1.optional_section_present)?;

        Ok(BUFRMessageV4 {
            section0,
            section1,
            section2,
            section3,
            section4,
        })
    }

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BUFR Message (edition {}):", self.section0.edition)?;
        write_identification(
            f,
            self.section0.edition,
            self.section1.length,
            &self.identification(),
        )?;
        write!(f, "\n    Local Use Data:      {} bytes", self.section1.local_use.len())
    }

    fn section0(&self) -> &Section0 {
        &self.section0
    }

    fn identification(&self) -> Identification {
        let s = &self.section1;
        Identification {
            master_table: s.master_table,
            center: s.centre,
            subcenter: s.subcentre,
            update_sequence: s.update_sequence_number,
            has_optional_section: s.optional_section_present,
            category: s.data_category,
            subcategory: s.international_data_subcategory,
            local_subcategory: s.local_subcategory,
            master_table_version: s.master_table_version,
            local_table_version: s.local_table_version,
            year: s.year,
            month: s.month,
            day: s.day,
            hour: s.hour,
            minute: s.minute,
            second: s.second,
        }
    }

    fn section1_length(&self) -> usize {
        self.section1.length
    }

    fn optional_section(&self) -> Option<&Section2> {
        self.section2.as_ref()
    }

    fn data_description(&self) -> &Section3 {
        &self.section3
    }

    fn data_section(&self) -> &Section4 {
        &self.section4
    }
}

#[derive(Clone, Debug)]
pub struct Section1 {
    pub length: usize,                      // octet 1-3
    pub master_table: u8,                   // octet 4
    pub centre: u16,                        // octet 5-6
    pub subcentre: u16,                     // octet 7-8
    pub update_sequence_number: u8,         // octet 9
    pub optional_section_present: bool,     // octet 10 bit1
    pub data_category: u8,                  // octet 11
    pub international_data_subcategory: u8, // octet 12
    pub local_subcategory: u8,              // octet 13
    pub master_table_version: u8,           // octet 14
    pub local_table_version: u8,            // octet 15
    pub year: u16,                          // octet 16-17 (4 digits)
    pub month: u8,                          // octet 18
    pub day: u8,                            // octet 19
    pub hour: u8,                           // octet 20
    pub minute: u8,                         // octet 21
    pub second: u8,                         // octet 22
    pub local_use: Vec<u8>,                 // octet 23-
}

fn parse_section1(input: &[u8]) -> IResult<&[u8], Section1> {
    let (input, length_u24) = be_u24(input)?;
    let length = length_u24 as usize;

    const FIXED_LEN: usize = 22;
    let (input, _) = check_length(input, length, FIXED_LEN)?;

    let (input, master_table) = be_u8(input)?;
    let (input, centre) = be_u16(input)?;
    let (input, subcentre) = be_u16(input)?;
    let (input, update_sequence_number) = be_u8(input)?;

    let (input, flags) = be_u8(input)?;
    let optional_section_present = (flags & 0x80) != 0;

    let (input, data_category) = be_u8(input)?;
    let (input, international_data_subcategory) = be_u8(input)?;
    let (input, local_subcategory) = be_u8(input)?;
    let (input, master_table_version) = be_u8(input)?;
    let (input, local_table_version) = be_u8(input)?;

    let (input, year) = be_u16(input)?;
    let (input, month) = be_u8(input)?;
    let (input, day) = be_u8(input)?;
    let (input, hour) = be_u8(input)?;
    let (input, minute) = be_u8(input)?;
    let (input, second) = be_u8(input)?;

    let (input, local_bytes) = take(length - FIXED_LEN)(input)?;

    Ok((
        input,
        Section1 {
            length,
            master_table,
            centre,
            subcentre,
            update_sequence_number,
            optional_section_present,
            data_category,
            international_data_subcategory,
            local_subcategory,
            master_table_version,
            local_table_version,
            year,
            month,
            day,
            hour,
            minute,
            second,
            local_use: local_bytes.to_vec(),
        },
    ))
}
