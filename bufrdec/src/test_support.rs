//! Builders assembling synthetic messages for tests. Not part of the
//! public decoding API.

use crate::descriptor::Descriptor;

#[derive(Clone)]
pub struct MessageBuilder {
    edition: u8,
    master_version: u8,
    local_version: u8,
    centre: u16,
    subcentre: u16,
    category: u8,
    subcategory: u8,
    year: u16,
    nsubsets: u16,
    observed: bool,
    compressed: bool,
    descriptors: Vec<Descriptor>,
    data: Vec<u8>,
}

impl MessageBuilder {
    fn new(edition: u8) -> Self {
        MessageBuilder {
            edition,
            master_version: 29,
            local_version: 0,
            centre: 98,
            subcentre: 0,
            category: 0,
            subcategory: 0,
            year: 2025,
            nsubsets: 1,
            observed: true,
            compressed: false,
            descriptors: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn edition3() -> Self {
        Self::new(3)
    }

    pub fn edition4() -> Self {
        Self::new(4)
    }

    pub fn category(mut self, category: u8, subcategory: u8) -> Self {
        self.category = category;
        self.subcategory = subcategory;
        self
    }

    pub fn tables(mut self, master_version: u8, local_version: u8) -> Self {
        self.master_version = master_version;
        self.local_version = local_version;
        self
    }

    pub fn centre(mut self, centre: u16, subcentre: u16) -> Self {
        self.centre = centre;
        self.subcentre = subcentre;
        self
    }

    pub fn observed_year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn subsets(mut self, count: u16, compressed: bool) -> Self {
        self.nsubsets = count;
        self.compressed = compressed;
        self
    }

    pub fn descriptors(mut self, descriptors: &[Descriptor]) -> Self {
        self.descriptors = descriptors.to_vec();
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let section1 = match self.edition {
            3 => self.build_section1_ed3(),
            4 => self.build_section1_ed4(),
            other => panic!("unsupported edition {} in test builder", other),
        };

        let mut section3 = Vec::new();
        push_u24(&mut section3, 7 + 2 * self.descriptors.len() as u32);
        section3.push(0);
        section3.extend_from_slice(&self.nsubsets.to_be_bytes());
        let mut flags = 0u8;
        if self.observed {
            flags |= 0x80;
        }
        if self.compressed {
            flags |= 0x40;
        }
        section3.push(flags);
        for desc in &self.descriptors {
            section3.extend_from_slice(&desc.to_bytes());
        }

        let mut section4 = Vec::new();
        push_u24(&mut section4, 4 + self.data.len() as u32);
        section4.push(0);
        section4.extend_from_slice(&self.data);

        let total = 8 + section1.len() + section3.len() + section4.len() + 4;

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"BUFR");
        push_u24(&mut out, total as u32);
        out.push(self.edition);
        out.extend_from_slice(&section1);
        out.extend_from_slice(&section3);
        out.extend_from_slice(&section4);
        out.extend_from_slice(b"7777");
        out
    }

    fn build_section1_ed4(&self) -> Vec<u8> {
        let mut s = Vec::new();
        push_u24(&mut s, 22);
        s.push(0); // master table
        s.extend_from_slice(&self.centre.to_be_bytes());
        s.extend_from_slice(&self.subcentre.to_be_bytes());
        s.push(0); // update sequence
        s.push(0); // no optional section
        s.push(self.category);
        s.push(self.subcategory);
        s.push(0); // local subcategory
        s.push(self.master_version);
        s.push(self.local_version);
        s.extend_from_slice(&self.year.to_be_bytes());
        s.extend_from_slice(&[8, 23, 12, 0, 0]); // month..second
        s
    }

    fn build_section1_ed3(&self) -> Vec<u8> {
        let mut s = Vec::new();
        push_u24(&mut s, 18);
        s.push(0); // master table
        s.push(self.subcentre as u8);
        s.push(self.centre as u8);
        s.push(0); // update sequence
        s.push(0); // no optional section
        s.push(self.category);
        s.push(self.subcategory);
        s.push(self.master_version);
        s.push(self.local_version);
        s.push((self.year % 100) as u8);
        s.extend_from_slice(&[8, 23, 12, 0]); // month..minute
        s.push(0); // pad octet
        s
    }
}

fn push_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes()[1..]);
}

/// Packs values of given bit widths into a big-endian bit stream, padding
/// the final byte with zeros.
pub fn pack_bits(fields: &[(u64, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    let mut nacc: u32 = 0;

    for &(value, width) in fields {
        let mut width = width;
        let mut value = value & if width >= 64 { u64::MAX } else { (1 << width) - 1 };
        while width > 0 {
            let chunk = width.min(8 - nacc);
            let shifted = value >> (width - chunk);
            acc = (acc << chunk) | (shifted & ((1 << chunk) - 1));
            nacc += chunk;
            width -= chunk;
            value &= if width >= 64 { u64::MAX } else { (1 << width) - 1 };
            if nacc == 8 {
                out.push(acc as u8);
                acc = 0;
                nacc = 0;
            }
        }
    }

    if nacc > 0 {
        out.push((acc << (8 - nacc)) as u8);
    }
    out
}
