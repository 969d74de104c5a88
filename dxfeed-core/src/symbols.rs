use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

/// Символ, который нельзя отдавать в FEED_SUBSCRIPTION
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// Пробел внутри символа
    #[error("symbol {0:?} contains whitespace")]
    Whitespace(String),

    /// Управляющий символ
    #[error("symbol {0:?} contains a control character")]
    Control(String),

    /// Незакрытая, лишняя или вложенная скобка
    #[error("symbol {0:?} has unbalanced or nested braces")]
    UnbalancedBraces(String),

    /// `{...}` в начале: атрибуты без самого символа
    #[error("symbol {0:?} has attributes but no base symbol")]
    NoBase(String),
}

/// Ошибка чтения файла символов
#[derive(Debug, Error)]
pub enum ReadSymbolsError {
    /// Ввод-вывод
    #[error("failed to read symbols")]
    Io(#[from] io::Error),

    /// Плохой символ в строке `line` (с 1)
    #[error("line {line}: {source}")]
    Invalid {
        /// номер строки
        line: usize,
        /// что не так с символом
        #[source]
        source: SymbolError,
    },
}

/// Синтаксис символа dxFeed: `SPY`, `/6EZ24:XCME`, `AAPL{=5m,tho=true}`.
///
/// Атрибуты в одной паре `{}` в конце, без пробелов. Регистр значим, его не трогаем.
pub fn check_symbol(symbol: &str) -> Result<(), SymbolError> {
    let mut in_attrs = false;
    let mut closed = false;

    for (i, c) in symbol.char_indices() {
        if c.is_whitespace() {
            return Err(SymbolError::Whitespace(symbol.to_string()));
        }
        if c.is_control() {
            return Err(SymbolError::Control(symbol.to_string()));
        }
        if closed {
            // после `}` ничего быть не должно
            return Err(SymbolError::UnbalancedBraces(symbol.to_string()));
        }

        match c {
            '{' if i == 0 => return Err(SymbolError::NoBase(symbol.to_string())),
            '{' if !in_attrs => in_attrs = true,
            '}' if in_attrs => {
                in_attrs = false;
                closed = true;
            }
            '{' | '}' => return Err(SymbolError::UnbalancedBraces(symbol.to_string())),
            _ => {}
        }
    }

    if in_attrs {
        return Err(SymbolError::UnbalancedBraces(symbol.to_string()));
    }
    Ok(())
}

/// Символы через запятую: "SPY, AAPL{=5m,tho=true}, /6EZ24:XCME".
///
/// Запятые внутри `{}` принадлежат атрибутам символа. Пустые элементы
/// пропускаются, результат отсортирован и без повторов.
pub fn parse_symbol_list(raw: &str) -> Result<Vec<String>, SymbolError> {
    let mut set = BTreeSet::new();
    collect_line(raw, &mut set)?;
    Ok(set.into_iter().collect())
}

/// Файл символов: символ на строку (или несколько через запятую),
/// от `#` до конца строки: комментарий
pub fn read_symbols<R: io::Read>(reader: R) -> Result<Vec<String>, ReadSymbolsError> {
    let mut set = BTreeSet::new();

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("");
        collect_line(content, &mut set)
            .map_err(|source| ReadSymbolsError::Invalid { line: idx + 1, source })?;
    }

    Ok(set.into_iter().collect())
}

/// [`read_symbols`] для файла
pub fn read_symbols_from_path(path: impl AsRef<Path>) -> Result<Vec<String>, ReadSymbolsError> {
    read_symbols(File::open(path)?)
}

fn collect_line(line: &str, set: &mut BTreeSet<String>) -> Result<(), SymbolError> {
    for item in split_top_level(line).map(str::trim) {
        if item.is_empty() {
            continue;
        }
        check_symbol(item)?;
        set.insert(item.to_string());
    }
    Ok(())
}

fn split_top_level(line: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0i32;
    line.split(move |c| match c {
        '{' => {
            depth += 1;
            false
        }
        '}' => {
            depth -= 1;
            false
        }
        ',' => depth <= 0,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn accepts_dxfeed_symbol_shapes() {
        for s in ["SPY", "/6EZ24:XCME", "AAPL{=5m}", "SPY{=d,tho=true}", "./ESZ24C4500:XCME", "$SPX.X"] {
            assert_eq!(check_symbol(s), Ok(()), "{s}");
        }
    }

    #[test]
    fn rejects_broken_symbols() {
        assert_eq!(check_symbol("SP Y"), Err(SymbolError::Whitespace("SP Y".into())));
        assert_eq!(check_symbol("SPY\u{7}"), Err(SymbolError::Control("SPY\u{7}".into())));
        assert_eq!(check_symbol("{=5m}"), Err(SymbolError::NoBase("{=5m}".into())));

        for s in ["SPY{=5m", "SPY}", "SPY{{=5m}}", "SPY{=5m}X", "SPY{=5m}{x}"] {
            assert_eq!(check_symbol(s), Err(SymbolError::UnbalancedBraces(s.into())), "{s}");
        }
    }

    #[test]
    fn list_keeps_commas_inside_attributes() {
        let got = parse_symbol_list("SPY{=5m,tho=true}, /6EZ24:XCME ,, AAPL").unwrap();
        assert_eq!(got, vec!["/6EZ24:XCME", "AAPL", "SPY{=5m,tho=true}"]);
    }

    #[test]
    fn list_is_case_sensitive_and_deduplicated() {
        let got = parse_symbol_list("spy,SPY, SPY ").unwrap();
        assert_eq!(got, vec!["SPY", "spy"]);

        assert!(parse_symbol_list("").unwrap().is_empty());
        assert!(parse_symbol_list(" , ,").unwrap().is_empty());
    }

    #[test]
    fn list_reports_first_invalid_symbol() {
        let err = parse_symbol_list("SPY, AAPL{=5m").unwrap_err();
        assert_eq!(err, SymbolError::UnbalancedBraces("AAPL{=5m".into()));
    }

    #[test]
    fn reader_strips_comments_and_merges_lines() {
        let input = "\
# futures
/6EZ24:XCME   # euro
/6BZ24:XCME, /6EZ24:XCME

SPY{=5m,tho=true}
";
        let got = read_symbols(Cursor::new(input)).unwrap();
        assert_eq!(got, vec!["/6BZ24:XCME", "/6EZ24:XCME", "SPY{=5m,tho=true}"]);
    }

    #[test]
    fn reader_points_at_bad_line() {
        let err = read_symbols(Cursor::new("SPY\n\nQQQ QQQ\n")).unwrap_err();
        match err {
            ReadSymbolsError::Invalid { line, source } => {
                assert_eq!(line, 3);
                assert_eq!(source, SymbolError::Whitespace("QQQ QQQ".into()));
            }
            other => panic!("expected invalid symbol, got {other:?}"),
        }
    }

    #[test]
    fn reads_from_temp_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "SPY\n/6EZ24:XCME\n#comment\nSPY").unwrap();

        let got = read_symbols_from_path(f.path()).unwrap();
        assert_eq!(got, vec!["/6EZ24:XCME", "SPY"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_symbols_from_path(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, ReadSymbolsError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn reader_error_is_propagated() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk gone"))
            }
        }

        let err = read_symbols(Broken).unwrap_err();
        assert!(matches!(err, ReadSymbolsError::Io(ref e) if e.to_string().contains("disk gone")));
    }
}
