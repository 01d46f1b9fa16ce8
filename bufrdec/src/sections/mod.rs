use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use nom::{
    IResult,
    bytes::complete::{tag, take},
    number::complete::{be_u8, be_u16, be_u24},
};

pub mod ed3;
pub mod ed4;

#[inline]
pub(crate) fn skip(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |input: &[u8]| {
        let (input, _) = take(n)(input)?;
        Ok((input, ()))
    }
}

#[inline]
pub(crate) fn skip1(input: &[u8]) -> IResult<&[u8], ()> {
    skip(1)(input)
}

#[derive(Clone, Debug)]
pub struct Section0 {
    pub total_length: u32,
    pub edition: u8,
}

pub(crate) fn parse_section0(input: &[u8]) -> IResult<&[u8], Section0> {
    let (input, _) = tag("BUFR")(input)?;
    let (input, total_length) = be_u24(input)?;
    let (input, edition) = be_u8(input)?;
    Ok((
        input,
        Section0 {
            total_length,
            edition,
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section2 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(crate) fn parse_section2(input: &[u8]) -> IResult<&[u8], Section2> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let (input, data) = take(length - 4)(input)?;
    Ok((
        input,
        Section2 {
            length: length as usize,
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
    /// Unexpanded descriptor octet pairs, a trailing pad octet included.
    pub data: Vec<u8>,
}

pub(crate) fn parse_section3(input: &[u8]) -> IResult<&[u8], Section3> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let (input, number_of_subsets) = be_u16(input)?;
    let (input, flags) = be_u8(input)?;
    let is_observation = (flags & 0b1000_0000) != 0;
    let is_compressed = (flags & 0b0100_0000) != 0;
    let (input, data) = take(length - 7)(input)?;
    Ok((
        input,
        Section3 {
            length: length as usize,
            number_of_subsets,
            is_observation,
            is_compressed,
            data: data.to_vec(),
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section4 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(crate) fn parse_section4(input: &[u8]) -> IResult<&[u8], Section4> {
    let (input, length) = be_u24(input)?;
    let (input, _) = skip1(input)?;
    let (input, data) = take(length - 4)(input)?;
    Ok((
        input,
        Section4 {
            length: length as usize,
            data: data.to_vec(),
        },
    ))
}

pub struct Section5;

pub(crate) fn parse_section5(input: &[u8]) -> IResult<&[u8], Section5> {
    let (input, _) = tag("7777")(input)?;
    Ok((input, Section5 {}))
}

pub(crate) fn parse_descriptor_bytes(input: &[u8]) -> Vec<Descriptor> {
    // A trailing odd octet is section padding.
    input
        .chunks_exact(2)
        .map(|pair| Descriptor::from_bytes([pair[0], pair[1]]))
        .collect()
}

/// Identification a decoder needs to pick table files for one message.
#[derive(Clone, Debug)]
pub struct TableInfo {
    pub master_table_version: u8,
    pub local_table_version: u8,
    pub center_id: u16,
    pub subcenter_id: u16,
    pub data_category: u8,
    /// Only edition 4 carries the international subcategory.
    pub international_subcategory: Option<u8>,
}

pub trait MessageEdition: Sized {
    fn parse(input: &[u8]) -> Result<Self>;

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    fn table_info(&self) -> TableInfo;

    fn subcenter_id(&self) -> u16 {
        self.table_info().subcenter_id
    }

    fn center_id(&self) -> u16 {
        self.table_info().center_id
    }

    fn master_table_version(&self) -> u8 {
        self.table_info().master_table_version
    }

    fn local_table_version(&self) -> u8 {
        self.table_info().local_table_version
    }

    fn subsets_count(&self) -> u16;

    fn ndescs(&self) -> usize;

    fn descriptors(&self) -> Result<Vec<Descriptor>>;

    fn data_block(&self) -> Result<&[u8]>;

    fn is_compressed(&self) -> bool;

    fn is_observation(&self) -> bool;
}

macro_rules! editions {
    ($(($edition:ident, $t: ty, $v: expr)),+$(,)?) => {
        #[derive(Clone)]
        pub enum BufrMessage {
            $(
                $edition($t),
            )+
        }

        impl MessageEdition for BufrMessage {
            fn parse(input: &[u8]) -> Result<Self> {
                let (_, section0) = parse_section0(input)?;
                match section0.edition {
                    $(
                        x if x == $v => {
                            let msg = <$t as MessageEdition>::parse(input)?;
                            Ok(BufrMessage::$edition(msg))
                        }
                    )+
                    _ => Err(Error::UnsupportedEdition(section0.edition)),
                }
            }

            fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.description(f),
                    )+
                }
            }

            fn table_info(&self) -> TableInfo {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.table_info(),
                    )+
                }
            }

            fn subsets_count(&self) -> u16 {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.subsets_count(),
                    )+
                }
            }

            fn ndescs(&self) -> usize {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.ndescs(),
                    )+
                }
            }

            fn descriptors(&self) -> Result<Vec<Descriptor>> {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.descriptors(),
                    )+
                }
            }

            fn data_block(&self) -> Result<&[u8]> {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.data_block(),
                    )+
                }
            }

            fn is_compressed(&self) -> bool {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.is_compressed(),
                    )+
                }
            }

            fn is_observation(&self) -> bool {
                match self {
                    $(
                        BufrMessage::$edition(msg) => msg.is_observation(),
                    )+
                }
            }
        }
    };
}

editions!((Ed3, ed3::Edition3Message, 3), (Ed4, ed4::Edition4Message, 4));

impl BufrMessage {
    pub fn edition(&self) -> u8 {
        match self {
            BufrMessage::Ed3(_) => 3,
            BufrMessage::Ed4(_) => 4,
        }
    }
}

impl std::fmt::Display for BufrMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufrMessage::Ed3(msg) => msg.description(f),
            BufrMessage::Ed4(msg) => msg.description(f),
        }
    }
}
