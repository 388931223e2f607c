pub mod v3;
pub mod v4;

pub(super) use super::{check_length, skip1};
use crate::errors::{Error, Result};
use crate::structs::tools::parse_descriptors;
use bufrtables::FXY;
use nom::{
    IResult,
    bytes::complete::{tag, take},
    number::complete::{be_u8, be_u16, be_u24},
};

macro_rules! message {
    ($(($version:ident, $t: ty, $v: pat)),+$(,)?) => {
        #[derive(Clone, Debug)]
        pub enum BUFRMessage {
            $(
                $version($t),
            )+
        }

        impl MessageVersion for BUFRMessage {
            fn parse(input: &[u8]) -> Result<Self> {
                let (_, section0) = parse_section0(input)?;
                match section0.edition {
                    $(
                        $v => {
                            let msg = <$t as MessageVersion>::parse(input)?;
                            Ok(BUFRMessage::$version(msg))
                        }
                    )+
                    _ => Err(Error::UnsupportedVersion(section0.edition)),
                }
            }

            fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.description(f),
                    )+
                }
            }

            fn section0(&self) -> &Section0 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section0(),
                    )+
                }
            }

            fn identification(&self) -> Identification {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.identification(),
                    )+
                }
            }

            fn section1_length(&self) -> usize {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section1_length(),
                    )+
                }
            }

            fn optional_section(&self) -> Option<&Section2> {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.optional_section(),
                    )+
                }
            }

            fn data_description(&self) -> &Section3 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.data_description(),
                    )+
                }
            }

            fn data_section(&self) -> &Section4 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.data_section(),
                    )+
                }
            }
        }
    };
}

message!((V3, v3::BUFRMessageV3, 2 | 3), (V4, v4::BUFRMessageV4, 4..=u8::MAX));

impl std::fmt::Display for BUFRMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description(f)
    }
}

pub trait MessageVersion: Sized {
    fn parse(input: &[u8]) -> Result<Self>;

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    fn section0(&self) -> &Section0;

    /// Edition-independent view of Section 1.
    fn identification(&self) -> Identification;

    fn section1_length(&self) -> usize;

    fn optional_section(&self) -> Option<&Section2>;

    fn data_description(&self) -> &Section3;

    fn data_section(&self) -> &Section4;

    fn edition(&self) -> u8 {
        self.section0().edition
    }

    fn subsets_count(&self) -> u16 {
        self.data_description().number_of_subsets
    }

    fn descriptors(&self) -> &[FXY] {
        &self.data_description().descriptors
    }

    fn data_block(&self) -> &[u8] {
        &self.data_section().data
    }
}

/// Section 1 fields normalised across editions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identification {
    pub master_table: u8,
    pub center: u16,
    pub subcenter: u16,
    pub update_sequence: u8,
    pub has_optional_section: bool,
    pub category: u8,
    pub subcategory: u8,
    pub local_subcategory: u8,
    pub master_table_version: u8,
    pub local_table_version: u8,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Clone, Debug)]
pub struct Section0 {
    pub total_length: usize,
    pub edition: u8,
}

pub(crate) fn parse_section0(input: &[u8]) -> IResult<&[u8], Section0> {
    let (input, _) = tag("BUFR")(input)?;
    let (input, total_length) = be_u24(input)?;
    let (input, edition) = be_u8(input)?;
    Ok((
        input,
        Section0 {
            total_length: total_length as usize,
            edition,
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section2 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(super) fn parse_section2(input: &[u8]) -> IResult<&[u8], Section2> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;
    let (input, _) = check_length(input, length, 4)?;
    let (input, _) = skip1(input)?;
    let (input, data) = take(length - 4)(input)?;
    Ok((
        input,
        Section2 {
            length,
            data: data.to_vec(),
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section3 {
    pub length: usize,
    pub number_of_subsets: u16,
    pub is_observation: bool,
    pub is_compressed: bool,
    pub descriptors: Vec<FXY>,
}

pub(super) fn parse_section3(input: &[u8]) -> IResult<&[u8], Section3> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;
    let (input, _) = check_length(input, length, 7)?;
    let (input, _) = skip1(input)?;
    let (input, number_of_subsets) = be_u16(input)?;
    let (input, flags) = be_u8(input)?;
    let is_observation = (flags & 0b1000_0000) != 0;
    let is_compressed = (flags & 0b0100_0000) != 0;
    let (input, data) = take(length - 7)(input)?;
    let descriptors = parse_descriptors(data).map_err(|_| {
        nom::Err::Error(nom::error::Error::new(data, nom::error::ErrorKind::Count))
    })?;
    Ok((
        input,
        Section3 {
            length,
            number_of_subsets,
            is_observation,
            is_compressed,
            descriptors,
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section4 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(super) fn parse_section4(input: &[u8]) -> IResult<&[u8], Section4> {
    let (input, length) = be_u24(input)?;
    let length = length as usize;
    let (input, _) = check_length(input, length, 4)?;
    let (input, _) = skip1(input)?;
    let (input, data) = take(length - 4)(input)?;
    Ok((
        input,
        Section4 {
            length,
            data: data.to_vec(),
        },
    ))
}

/// Sections 2 to 4, which share one layout across editions.
pub(super) fn parse_body(
    input: &[u8],
    has_optional_section: bool,
) -> IResult<&[u8], (Option<Section2>, Section3, Section4)> {
    let (input, section2) = if has_optional_section {
        let (input, sec2) = parse_section2(input)?;
        (input, Some(sec2))
    } else {
        (input, None)
    };
    let (input, section3) = parse_section3(input)?;
    let (input, section4) = parse_section4(input)?;
    Ok((input, (section2, section3, section4)))
}

pub(super) fn write_identification(
    f: &mut std::fmt::Formatter<'_>,
    edition: u8,
    length: usize,
    id: &Identification,
) -> std::fmt::Result {
    writeln!(f, "Section 1 (BUFR edition {}):", edition)?;
    writeln!(f, "  Length: {} bytes", length)?;
    writeln!(f)?;
    writeln!(f, "  Organization:")?;
    writeln!(f, "    Centre:              {:<5} (0x{:04X})", id.center, id.center)?;
    writeln!(
        f,
        "    Sub-centre:          {:<5} (0x{:04X})",
        id.subcenter, id.subcenter
    )?;
    writeln!(f, "    Update Sequence:     {}", id.update_sequence)?;
    writeln!(f)?;
    writeln!(f, "  Data Classification:")?;
    writeln!(f, "    Category:            {}", id.category)?;
    writeln!(f, "    Sub-category:        {}", id.subcategory)?;
    writeln!(f, "    Local Sub:           {}", id.local_subcategory)?;
    writeln!(f)?;
    writeln!(f, "  Table Versions:")?;
    writeln!(
        f,
        "    Master Table:        {} (v{})",
        id.master_table, id.master_table_version
    )?;
    writeln!(f, "    Local Table:         v{}", id.local_table_version)?;
    writeln!(f)?;
    writeln!(f, "  Observation Time:")?;
    writeln!(
        f,
        "    DateTime:            {:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        id.year, id.month, id.day, id.hour, id.minute, id.second
    )?;
    writeln!(f)?;
    writeln!(f, "  Optional Data:")?;
    write!(
        f,
        "    Section 2 Present:   {}",
        if id.has_optional_section { "Yes" } else { "No" }
    )
}
