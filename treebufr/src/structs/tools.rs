use crate::errors::{Error, Result};
use bufrtables::FXY;
use nom::{IResult, number::complete::be_u16};

/// Split a Data-Description payload into descriptors. A trailing odd byte is padding.
pub(crate) fn parse_descriptors(input: &[u8]) -> Result<Vec<FXY>> {
    parse_descriptors_inner(input)
        .map(|(_, v)| v)
        .map_err(|_| Error::ParseError("Can't parse descriptors from section3".to_string()))
}

fn parse_descriptors_inner(mut input: &[u8]) -> IResult<&[u8], Vec<FXY>> {
    let mut results = Vec::with_capacity(input.len() / 2);
    while input.len() > 1 {
        let (rest, code) = be_u16(input)?;
        results.push(FXY::from_u16(code));
        input = rest;
    }

    Ok((input, results))
}
