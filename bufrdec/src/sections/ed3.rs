use super::{
    MessageEdition, Section0, Section2, Section3, Section4, TableInfo, parse_descriptor_bytes,
    parse_section0, parse_section2, parse_section3, parse_section4, parse_section5,
};
use crate::descriptor::Descriptor;
use crate::errors::Result;
use nom::{
    IResult,
    bytes::complete::take,
    error::{Error, ErrorKind},
    number::complete::{be_u8, be_u24},
};

#[derive(Clone)]
pub struct Edition3Message {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

impl MessageEdition for Edition3Message {
    fn parse(input: &[u8]) -> Result<Self> {
        let (input, section0) = parse_section0(input)?;
        let (input, section1) = parse_section1(input)?;
        let (input, section2) = if section1.has_optional_section {
            let (input, sec2) = parse_section2(input)?;
            (input, Some(sec2))
        } else {
            (input, None)
        };
        let (input, section3) = parse_section3(input)?;
        let (input, section4) = parse_section4(input)?;
        let (_input, _section5) = parse_section5(input)?;

        Ok(Edition3Message {
            section0,
            section1,
            section2,
            section3,
            section4,
        })
    }

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BUFR message, edition 3:")?;
        writeln!(f, "{}", self.section1)?;
        writeln!(
            f,
            "  Subsets:             {} ({}compressed)",
            self.section3.number_of_subsets,
            if self.section3.is_compressed {
                ""
            } else {
                "not "
            }
        )
    }

    fn table_info(&self) -> TableInfo {
        TableInfo {
            master_table_version: self.section1.master_version,
            local_table_version: self.section1.local_version,
            center_id: self.section1.centre as u16,
            subcenter_id: self.section1.subcentre as u16,
            data_category: self.section1.data_category,
            international_subcategory: None,
        }
    }

    fn subsets_count(&self) -> u16 {
        self.section3.number_of_subsets
    }

    fn ndescs(&self) -> usize {
        self.section3.data.len() / 2
    }

    fn descriptors(&self) -> Result<Vec<Descriptor>> {
        Ok(parse_descriptor_bytes(&self.section3.data))
    }

    fn data_block(&self) -> Result<&[u8]> {
        Ok(&self.section4.data)
    }

    fn is_compressed(&self) -> bool {
        self.section3.is_compressed
    }

    fn is_observation(&self) -> bool {
        self.section3.is_observation
    }
}

#[derive(Clone, Debug)]
pub struct Section1 {
    pub length: usize,              // octet 1-3
    pub master_table: u8,           // octet 4
    pub subcentre: u8,              // octet 5
    pub centre: u8,                 // octet 6
    pub update_sequence: u8,        // octet 7
    pub has_optional_section: bool, // octet 8 bit 1
    pub data_category: u8,          // octet 9
    pub data_subcategory: u8,       // octet 10
    pub master_version: u8,         // octet 11
    pub local_version: u8,          // octet 12
    /// Windowed from the two-digit year of century in octet 13.
    pub year: u16,
    pub month: u8,  // octet 14
    pub day: u8,    // octet 15
    pub hour: u8,   // octet 16
    pub minute: u8, // octet 17
    pub local_use: Vec<u8>,
}

fn parse_section1(input: &[u8]) -> IResult<&[u8], Section1> {
    let (input, length_u24) = be_u24(input)?;
    let length = length_u24 as usize;

    const FIXED_LEN: usize = 17;
    if length < FIXED_LEN {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
    }

    let (input, master_table) = be_u8(input)?;
    let (input, subcentre) = be_u8(input)?;
    let (input, centre) = be_u8(input)?;
    let (input, update_sequence) = be_u8(input)?;

    let (input, flags) = be_u8(input)?;
    let has_optional_section = (flags & 0x80) != 0;

    let (input, data_category) = be_u8(input)?;
    let (input, data_subcategory) = be_u8(input)?;
    let (input, master_version) = be_u8(input)?;
    let (input, local_version) = be_u8(input)?;

    let (input, year_of_century) = be_u8(input)?;
    let (input, month) = be_u8(input)?;
    let (input, day) = be_u8(input)?;
    let (input, hour) = be_u8(input)?;
    let (input, minute) = be_u8(input)?;

    let year = if year_of_century > 80 {
        1900 + year_of_century as u16
    } else {
        2000 + year_of_century as u16
    };

    let local_len = length - FIXED_LEN;
    let (input, local_bytes) = take(local_len)(input)?;

    Ok((
        input,
        Section1 {
            length,
            master_table,
            subcentre,
            centre,
            update_sequence,
            has_optional_section,
            data_category,
            data_subcategory,
            master_version,
            local_version,
            year,
            month,
            day,
            hour,
            minute,
            local_use: local_bytes.to_vec(),
        },
    ))
}

impl std::fmt::Display for Section1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Centre / sub-centre: {} / {}",
            self.centre, self.subcentre
        )?;
        writeln!(
            f,
            "  Category:            {} (sub {})",
            self.data_category, self.data_subcategory
        )?;
        writeln!(
            f,
            "  Tables:              master {} v{}, local v{}",
            self.master_table, self.master_version, self.local_version
        )?;
        write!(
            f,
            "  Observed at:         {:04}-{:02}-{:02} {:02}:{:02} UTC",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}
