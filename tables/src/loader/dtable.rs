use super::EntryLoader;
use crate::{FXY, entry::SequenceEntry};

/// Rows sharing the same `FXY1` are folded into one chain, in file order.
#[derive(Debug, Clone, Default)]
pub struct SequenceCsvLoader {
    current_chain: Option<SequenceEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RawSequenceRow {
    #[serde(rename = "FXY1")]
    pub fxy1: String,
    #[serde(rename = "Title_en")]
    pub title_en: Option<String>,
    #[serde(rename = "FXY2")]
    pub fxy2: String,
}

impl EntryLoader for SequenceCsvLoader {
    type RawEntry = RawSequenceRow;
    type Output = SequenceEntry;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let fxy = FXY::from_str(&raw.fxy1)?;
        let element = FXY::from_str(&raw.fxy2)?;

        match self.current_chain.as_mut() {
            Some(chain) if chain.fxy == fxy => {
                chain.chain.push(element);
                Ok(None)
            }
            _ => {
                let finished = self.current_chain.take();
                let title = raw.title_en.filter(|t| !t.trim().is_empty());
                self.current_chain = Some(SequenceEntry::new(fxy, title, vec![element]));
                Ok(finished)
            }
        }
    }

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(self.current_chain.take())
    }
}
