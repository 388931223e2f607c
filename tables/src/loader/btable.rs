use super::EntryLoader;
use crate::{FXY, entry::ElementEntry};

#[derive(Default)]
pub struct ElementCsvLoader;

#[derive(Debug, serde::Deserialize)]
pub struct RawElementRow {
    #[serde(rename = "FXY")]
    pub fxy: String,
    #[serde(rename = "ElementName_en")]
    pub element_name_en: String,
    #[serde(rename = "BUFR_Unit")]
    pub bufr_unit: String,
    #[serde(rename = "BUFR_Scale")]
    pub bufr_scale: i32,
    #[serde(rename = "BUFR_ReferenceValue")]
    pub bufr_reference_value: i64,
    #[serde(rename = "BUFR_DataWidth_Bits")]
    pub bufr_datawidth_bits: u32,
}

impl EntryLoader for ElementCsvLoader {
    type RawEntry = RawElementRow;
    type Output = ElementEntry;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let fxy = FXY::from_str(&raw.fxy)?;
        if !fxy.is_element() {
            return Err(anyhow::anyhow!("{} is not an element descriptor", fxy));
        }

        Ok(Some(ElementEntry {
            fxy,
            name: raw.element_name_en.trim().to_string(),
            unit: raw.bufr_unit.trim().to_string(),
            scale: raw.bufr_scale,
            reference: raw.bufr_reference_value,
            width: raw.bufr_datawidth_bits,
        }))
    }
}
