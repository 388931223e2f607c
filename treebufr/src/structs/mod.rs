use nom::{IResult, bytes::complete::take};
pub(super) mod tools;
pub mod versions;

#[inline]
pub fn skip(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |input: &[u8]| {
        let (input, _) = take(n)(input)?;
        Ok((input, ()))
    }
}

#[inline]
pub fn skip1(input: &[u8]) -> IResult<&[u8], ()> {
    skip(1)(input)
}

/// Fail with `LengthValue` unless a declared section length covers its fixed header.
#[inline]
pub(crate) fn check_length(input: &[u8], length: usize, fixed: usize) -> IResult<&[u8], ()> {
    if length < fixed {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    Ok((input, ()))
}
