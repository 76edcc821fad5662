use std::path::Path;

use anyhow::{Context, Result, bail};

const NO_DESCRIPTION: &str = "No description available.";

/// One entry of the sample list.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleName {
    pub name: String,
    pub description: String,
}

impl SampleName {
    /// Blanks and tabs in `name` become underscores so it can go in a file name.
    pub fn new(name: &str, description: &str) -> Self {
        let name = name.replace([' ', '\t'], "_");
        let description = if description.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            description.to_string()
        };
        SampleName { name, description }
    }
}

/// The samples of a run, in measurement order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleList {
    samples: Vec<SampleName>,
}

impl SampleList {
    /// Read a sample list: one `name;description` per line, `#` comments and
    /// blank lines skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading sample list {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing sample list {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let samples: Vec<SampleName> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let (name, description) = line.split_once(';').unwrap_or((line, ""));
                SampleName::new(name.trim(), description.trim())
            })
            .collect();
        if samples.is_empty() {
            bail!("sample list contains no samples");
        }
        Ok(SampleList { samples })
    }

    /// `Sample1 … SampleN` for runs without a list.
    pub fn numbered(count: usize) -> Self {
        let samples = (1..=count)
            .map(|i| SampleName::new(&format!("Sample{i}"), ""))
            .collect();
        SampleList { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SampleName> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleName> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_names_and_descriptions() {
        let list = SampleList::parse(
            "# filters measured on 2024-03-02\n\
             \n\
             BG 18 ; blue-green glass; 2 mm\n\
             OG\t550\n",
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.get(0),
            Some(&SampleName {
                name: "BG_18".to_string(),
                description: "blue-green glass; 2 mm".to_string(),
            })
        );
        assert_eq!(list.get(1).map(|s| s.name.as_str()), Some("OG_550"));
        assert_eq!(
            list.get(1).map(|s| s.description.as_str()),
            Some(NO_DESCRIPTION)
        );
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(SampleList::parse("# only a comment\n\n").is_err());
    }

    #[test]
    fn numbered_fallback() {
        let list = SampleList::numbered(2);
        let names: Vec<_> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Sample1", "Sample2"]);
        assert!(SampleList::numbered(0).is_empty());
    }
}
