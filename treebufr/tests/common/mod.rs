#![allow(dead_code)]

use bufrtables::{ElementEntry, FXY, SequenceEntry, TableStore};
use libtreebufr::{DecodedMessage, Decoder, DecoderConfig, StreamEvent};
use std::sync::Arc;

pub const CENTER: u16 = 98;
pub const MASTER_VERSION: u8 = 30;

/// MSB-first bit packer for building Data sections by hand.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
        self
    }

    /// Text padded with blanks to `len` bytes.
    pub fn put_str(&mut self, text: &str, len: usize) -> &mut Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, b' ');
        for b in bytes {
            self.put(b as u64, 8);
        }
        self
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Assembles a complete BUFR message around a descriptor list and payload.
#[derive(Clone)]
pub struct MessageBuilder {
    pub edition: u8,
    pub center: u16,
    pub category: u8,
    pub master_version: u8,
    pub local_version: u8,
    pub subsets: u16,
    pub compressed: bool,
    pub descriptors: Vec<FXY>,
    pub data: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(descriptors: &[FXY], data: Vec<u8>) -> Self {
        MessageBuilder {
            edition: 4,
            center: CENTER,
            category: 0,
            master_version: MASTER_VERSION,
            local_version: 0,
            subsets: 1,
            compressed: false,
            descriptors: descriptors.to_vec(),
            data,
        }
    }

    pub fn subsets(mut self, subsets: u16) -> Self {
        self.subsets = subsets;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    pub fn category(mut self, category: u8) -> Self {
        self.category = category;
        self
    }

    pub fn edition(mut self, edition: u8) -> Self {
        self.edition = edition;
        self
    }

    fn section1(&self) -> Vec<u8> {
        if self.edition >= 4 {
            let mut s = vec![0, 0, 22, 0];
            s.extend_from_slice(&self.center.to_be_bytes());
            s.extend_from_slice(&[0, 0, 0, 0]);
            s.extend_from_slice(&[self.category, 0, 0, self.master_version, self.local_version]);
            s.extend_from_slice(&[0x07, 0xE8, 1, 2, 3, 4, 5]);
            s
        } else {
            vec![
                0,
                0,
                17,
                0,
                0,
                self.center as u8,
                0,
                0,
                self.category,
                0,
                self.master_version,
                self.local_version,
                24,
                1,
                2,
                3,
                4,
            ]
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = self.section1();

        let length = 7 + 2 * self.descriptors.len();
        body.extend_from_slice(&(length as u32).to_be_bytes()[1..]);
        body.push(0);
        body.extend_from_slice(&self.subsets.to_be_bytes());
        body.push(if self.compressed { 0xC0 } else { 0x80 });
        for d in &self.descriptors {
            body.extend_from_slice(&d.to_u16().to_be_bytes());
        }

        let length = 4 + self.data.len();
        body.extend_from_slice(&(length as u32).to_be_bytes()[1..]);
        body.push(0);
        body.extend_from_slice(&self.data);

        let total = 8 + body.len() + 4;
        let mut message = b"BUFR".to_vec();
        message.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        message.push(self.edition);
        message.extend_from_slice(&body);
        message.extend_from_slice(b"7777");
        message
    }
}

pub fn fxy(f: u8, x: u8, y: u8) -> FXY {
    FXY::new(f, x, y)
}

fn element(fxy: FXY, name: &str, unit: &str, scale: i32, reference: i64, width: u32) -> ElementEntry {
    ElementEntry::new(fxy, name, unit, scale, reference, width)
}

fn text(y: u8, name: &str, chars: u32) -> ElementEntry {
    element(fxy(0, 0, y), name, "CCITT IA5", 0, 0, chars * 8)
}

/// Master tables for the test messages.
pub fn store() -> TableStore {
    let store = TableStore::new();
    store.insert_master(
        MASTER_VERSION,
        vec![
            text(10, "F descriptor to be added or defined", 1),
            text(11, "X descriptor to be added or defined", 2),
            text(12, "Y descriptor to be added or defined", 3),
            text(13, "Element name, line 1", 32),
            text(14, "Element name, line 2", 32),
            text(15, "Units name", 24),
            text(16, "Units scale sign", 1),
            text(17, "Units scale", 3),
            text(18, "Units reference sign", 1),
            text(19, "Units reference value", 10),
            text(20, "Element data width", 3),
            text(30, "Descriptor defining sequence", 6),
            element(fxy(0, 1, 15), "Station or site name", "CCITT IA5", 0, 0, 64),
            element(fxy(0, 4, 1), "Year", "a", 0, 0, 12),
            element(fxy(0, 4, 2), "Month", "mon", 0, 0, 4),
            element(fxy(0, 7, 4), "Pressure", "Pa", -1, 0, 14),
            element(fxy(0, 8, 2), "Vertical significance", "Code table", 0, 0, 6),
            element(fxy(0, 11, 1), "Wind direction", "degree true", 0, 0, 10),
            element(fxy(0, 12, 1), "Temperature", "K", 1, 0, 12),
            element(fxy(0, 12, 101), "Temperature/air temperature", "K", 2, 0, 16),
            element(fxy(0, 31, 1), "Delayed descriptor replication factor", "Numeric", 0, 0, 8),
            element(fxy(0, 31, 2), "Extended delayed descriptor replication factor", "Numeric", 0, 0, 16),
            element(fxy(0, 31, 11), "Delayed descriptor and data repetition factor", "Numeric", 0, 0, 8),
            element(fxy(0, 31, 12), "Extended delayed descriptor and data repetition factor", "Numeric", 0, 0, 16),
            element(fxy(0, 31, 21), "Associated field significance", "Code table", 0, 0, 6),
            element(fxy(0, 31, 31), "Data present indicator", "Flag table", 0, 0, 1),
        ],
        vec![SequenceEntry::new(
            fxy(3, 1, 11),
            Some("Year, month".to_string()),
            vec![fxy(0, 4, 1), fxy(0, 4, 2)],
        )],
    );
    store
}

pub fn decoder() -> Decoder {
    decoder_with(DecoderConfig::default())
}

pub fn decoder_with(config: DecoderConfig) -> Decoder {
    Decoder::new(Arc::new(store()), config)
}

pub fn events(decoder: &mut Decoder, bytes: &[u8]) -> Vec<StreamEvent> {
    decoder.decode_bytes(bytes).collect()
}

/// Decode a stream holding exactly one data message.
pub fn decode_one(decoder: &mut Decoder, bytes: &[u8]) -> DecodedMessage {
    let mut found = events(decoder, bytes);
    assert_eq!(found.len(), 1, "expected one message, got {:?}", found);
    match found.remove(0) {
        StreamEvent::Decoded(decoded) => decoded,
        other => panic!("message was not decoded: {:?}", other),
    }
}
