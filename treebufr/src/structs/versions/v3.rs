use nom::{
    IResult,
    bytes::complete::take,
    number::complete::{be_u8, be_u24},
};

use crate::errors::Result;

use super::{
    Identification, MessageVersion, Section0, Section2, Section3, Section4, check_length,
    parse_body, parse_section0, write_identification,
};

/// Editions 2 and 3: single-byte center fields and a two-digit year.
#[derive(Clone, Debug)]
pub struct BUFRMessageV3 {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

impl MessageVersion for BUFRMessageV3 {
    fn parse(input: &[u8]) -> Result<Self> {
        let (input, section0) = parse_section0(input)?;
        let (input, section1) = parse_section1(input)?;
        let (_input, (section2, section3, section4)) =
            parse_body(input, section1.optional_section_present)?;

        Ok(BUFRMessageV3 {
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
        )
    }

    fn section0(&self) -> &Section0 {
        &self.section0
    }

    fn identification(&self) -> Identification {
        let s = &self.section1;
        Identification {
            master_table: s.master_table,
            center: s.centre as u16,
            subcenter: s.subcentre as u16,
            update_sequence: s.update_sequence_number,
            has_optional_section: s.optional_section_present,
            category: s.data_category,
            subcategory: s.data_subcategory,
            local_subcategory: 0,
            master_table_version: s.master_table_version,
            local_table_version: s.local_table_version,
            year: full_year(s.year),
            month: s.month.max(1),
            day: s.day.max(1),
            hour: s.hour,
            minute: s.minute,
            second: 0,
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

/// Two-digit years above 100 carry a century offset.
pub fn full_year(year_of_century: u8) -> u16 {
    let mut year = year_of_century as u16;
    if year > 100 {
        year -= 100;
    }
    year + 2000
}

#[derive(Clone, Debug)]
pub struct Section1 {
    pub length: usize,
    pub master_table: u8,               // octet 4
    pub subcentre: u8,                  // octet 5
    pub centre: u8,                     // octet 6
    pub update_sequence_number: u8,     // octet 7
    pub optional_section_present: bool, // octet 8 bit1 (MSB)
    pub data_category: u8,              // octet 9
    pub data_subcategory: u8,           // octet 10
    pub master_table_version: u8,       // octet 11
    pub local_table_version: u8,        // octet 12
    pub year: u8,                       // octet 13 (year of century)
    pub month: u8,                      // octet 14
    pub day: u8,                        // octet 15
    pub hour: u8,                       // octet 16
    pub minute: u8,                     // octet 17
    pub local_use: Vec<u8>,             // octet 18-
}

fn parse_section1(input: &[u8]) -> IResult<&[u8], Section1> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;

    const FIXED_LEN: usize = 17;
    let (input, _) = check_length(input, length, FIXED_LEN)?;

    let (input, master_table) = be_u8(input)?;
    let (input, subcentre) = be_u8(input)?;
    let (input, centre) = be_u8(input)?;
    let (input, update_sequence_number) = be_u8(input)?;
    let (input, optional_section_flag) = be_u8(input)?;
    let optional_section_present = (optional_section_flag & 0x80) != 0;

    let (input, data_category) = be_u8(input)?;
    let (input, data_subcategory) = be_u8(input)?;
    let (input, master_table_version) = be_u8(input)?;
    let (input, local_table_version) = be_u8(input)?;
    let (input, year) = be_u8(input)?;
    let (input, month) = be_u8(input)?;
    let (input, day) = be_u8(input)?;
    let (input, hour) = be_u8(input)?;
    let (input, minute) = be_u8(input)?;

    let (input, local_use) = take(length - FIXED_LEN)(input)?;

    Ok((
        input,
        Section1 {
            length,
            master_table,
            subcentre,
            centre,
            update_sequence_number,
            optional_section_present,
            data_category,
            data_subcategory,
            master_table_version,
            local_table_version,
            year,
            month,
            day,
            hour,
            minute,
            local_use: local_use.to_vec(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_year() {
        assert_eq!(full_year(24), 2024);
        assert_eq!(full_year(100), 2100);
        assert_eq!(full_year(112), 2012);
    }
}
