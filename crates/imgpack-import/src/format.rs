use std::fmt;
use std::str::FromStr;

use crate::ImportError;

/// Input layout selector. Closed: anything else is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Every file under one directory, label 0.
    Dir,
    /// `<image>\t<label>` lines.
    List,
    /// `<root>/<category>/<files...>` with categories named 0..N-1.
    SubDir,
    /// `<image>\t<json-annotation>` lines.
    AnnoJson,
    /// `<image>\t<annotation-image>` lines.
    AnnoImage,
    /// Re-encode an existing imgpack store.
    Store,
    /// One tar archive location per line; label = line index.
    Tars,
}

/// Shape of the record built from a tab-separated manifest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListVariant {
    ScalarLabel,
    JsonAnnotation,
    ImageAnnotation,
}

pub const FORMAT_HELP: &str = "\
Formats (-f/--format, number or name):
  0 | dir         scan one directory, every file gets label 0
  1 | list        list of <image>\\t<label>
  2 | subdir      scan <input>/<category>/..., categories named 0..N-1
  3 | anno-json   list of <image>\\t<json-annotation>
  4 | anno-image  list of <image>\\t<annotation-image>
  5 | store       re-encode an existing imgpack store (honors --limit)
  6 | tars        list of tar archives, label = line index

<image> may be a local path or an http(s) URL (downloaded into --cache).";

impl Format {
    pub const ALL: [Format; 7] = [
        Format::Dir,
        Format::List,
        Format::SubDir,
        Format::AnnoJson,
        Format::AnnoImage,
        Format::Store,
        Format::Tars,
    ];

    pub fn code(self) -> u8 {
        match self {
            Format::Dir => 0,
            Format::List => 1,
            Format::SubDir => 2,
            Format::AnnoJson => 3,
            Format::AnnoImage => 4,
            Format::Store => 5,
            Format::Tars => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Dir => "dir",
            Format::List => "list",
            Format::SubDir => "subdir",
            Format::AnnoJson => "anno-json",
            Format::AnnoImage => "anno-image",
            Format::Store => "store",
            Format::Tars => "tars",
        }
    }

    pub fn list_variant(self) -> Option<ListVariant> {
        match self {
            Format::List => Some(ListVariant::ScalarLabel),
            Format::AnnoJson => Some(ListVariant::JsonAnnotation),
            Format::AnnoImage => Some(ListVariant::ImageAnnotation),
            _ => None,
        }
    }
}

impl FromStr for Format {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        let format = match norm.as_str() {
            "0" | "dir" => Format::Dir,
            "1" | "list" => Format::List,
            "2" | "subdir" | "sub-dir" => Format::SubDir,
            "3" | "anno-json" | "json" => Format::AnnoJson,
            "4" | "anno-image" | "image" => Format::AnnoImage,
            "5" | "store" => Format::Store,
            "6" | "tars" | "tar" => Format::Tars,
            _ => return Err(ImportError::UnknownFormat(s.to_string())),
        };
        Ok(format)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codes_and_names() {
        for format in Format::ALL {
            assert_eq!(format.code().to_string().parse::<Format>().unwrap(), format);
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
        assert_eq!("ANNO_JSON".parse::<Format>().unwrap(), Format::AnnoJson);
    }

    #[test]
    fn parse_rejects_unknown_selectors() {
        for bad in ["7", "-1", "", "lists", "csv"] {
            match bad.parse::<Format>() {
                Err(ImportError::UnknownFormat(s)) => assert_eq!(s, bad),
                other => panic!("expected UnknownFormat for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn only_tab_list_formats_have_a_variant() {
        assert_eq!(Format::List.list_variant(), Some(ListVariant::ScalarLabel));
        assert_eq!(
            Format::AnnoJson.list_variant(),
            Some(ListVariant::JsonAnnotation)
        );
        assert_eq!(
            Format::AnnoImage.list_variant(),
            Some(ListVariant::ImageAnnotation)
        );
        for f in [Format::Dir, Format::SubDir, Format::Store, Format::Tars] {
            assert_eq!(f.list_variant(), None);
        }
    }
}
