use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::loader;
use crate::sections::{BufrMessage, MessageEdition};
use crate::table_path::get_tables_base_path;
use crate::tables::TableStore;

#[derive(Clone)]
pub struct MessageBlock {
    message: BufrMessage,
}

impl std::fmt::Display for MessageBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Deref for MessageBlock {
    type Target = BufrMessage;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl MessageBlock {
    pub fn new(message: BufrMessage) -> Self {
        MessageBlock { message }
    }

    /// Loads the tables this message needs from the configured base
    /// directory. Tries master versions downward from the advertised one,
    /// then merges centre-local entries on top when the message carries a
    /// local version.
    pub fn load_tables(&self) -> Result<Arc<TableStore>> {
        self.load_tables_from(get_tables_base_path())
    }

    pub fn load_tables_from<P: AsRef<Path>>(&self, dir: P) -> Result<Arc<TableStore>> {
        let dir = dir.as_ref();
        let info = self.message.table_info();

        let mut store = (0..=info.master_table_version)
            .rev()
            .find_map(|version| {
                loader::load_master_tables_from(dir, version)
                    .ok()
                    .inspect(|_| {
                        if version != info.master_table_version {
                            log::warn!("Falling back to Master Table version {}", version);
                        }
                    })
            })
            .ok_or(Error::TableNotFoundEmpty)?;

        if info.local_table_version != 0 {
            match loader::load_local_tables_from(
                dir,
                info.center_id,
                info.subcenter_id,
                info.local_table_version,
            ) {
                Ok(local) => store.absorb(local),
                Err(e) => log::warn!(
                    "No local tables for centre {} subcentre {} version {}: {}",
                    info.center_id,
                    info.subcenter_id,
                    info.local_table_version,
                    e
                ),
            }
        }

        Ok(Arc::new(store))
    }
}

pub struct BufrFile {
    messages: Vec<MessageBlock>,
}

impl Default for BufrFile {
    fn default() -> Self {
        Self::new()
    }
}

impl BufrFile {
    pub fn new() -> Self {
        BufrFile {
            messages: Vec::new(),
        }
    }

    pub(crate) fn push_message(&mut self, message: BufrMessage) {
        self.messages.push(MessageBlock::new(message));
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message_at(&self, index: usize) -> Option<&MessageBlock> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[MessageBlock] {
        &self.messages
    }
}
