use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use dxfeed_core::symbols::{self, ReadSymbolsError, SymbolError};

use crate::cli::Args;

#[derive(Debug, Error)]
pub(crate) enum SymbolsError {
    #[error("no symbols source: pass --symbols-file or --symbols")]
    MissingSource,

    #[error("no symbols in {0}")]
    Empty(String),

    #[error("bad symbols file {path:?}")]
    File {
        path: PathBuf,
        #[source]
        source: ReadSymbolsError,
    },

    #[error("bad --symbols value")]
    Inline(#[source] SymbolError),
}

/// Откуда берём символы подписки
#[derive(Debug, Clone, Copy)]
pub(crate) enum SymbolSource<'a> {
    File(&'a Path),
    Inline(&'a str),
}

impl fmt::Display for SymbolSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolSource::File(path) => write!(f, "file {path:?}"),
            SymbolSource::Inline(raw) => write!(f, "--symbols {raw:?}"),
        }
    }
}

impl<'a> SymbolSource<'a> {
    /// clap-группа `symbols_source` гарантирует ровно один источник
    pub(crate) fn from_args(args: &'a Args) -> Option<Self> {
        match (&args.symbols_file, &args.symbols) {
            (Some(path), _) => Some(SymbolSource::File(path)),
            (None, Some(raw)) => Some(SymbolSource::Inline(raw)),
            (None, None) => None,
        }
    }

    /// Отсортированный список без повторов; каждый символ проверен на синтаксис dxFeed
    pub(crate) fn load(self) -> Result<Vec<String>, SymbolsError> {
        let list = match self {
            SymbolSource::File(path) => {
                symbols::read_symbols_from_path(path).map_err(|source| SymbolsError::File {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            SymbolSource::Inline(raw) => symbols::parse_symbol_list(raw).map_err(SymbolsError::Inline)?,
        };

        if list.is_empty() {
            return Err(SymbolsError::Empty(self.to_string()));
        }
        Ok(list)
    }
}

pub(crate) fn load_symbols(args: &Args) -> Result<Vec<String>, SymbolsError> {
    SymbolSource::from_args(args)
        .ok_or(SymbolsError::MissingSource)?
        .load()
}
