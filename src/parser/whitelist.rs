use std::collections::HashSet;

/// How raw whitelist lines are normalized before they are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitelistOptions {
    pub trim_start: bool,
    pub trim_end: bool,
    pub ignore_case: bool,
}

/// Immutable set of channel ids a run retains.
#[derive(Debug, Clone, Default)]
pub struct ChannelWhitelist {
    ids: HashSet<String>,
    ignore_case: bool,
}

impl ChannelWhitelist {
    /// Exact, case-sensitive whitelist. Empty lines are skipped, duplicates collapse.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_lines_with(lines, WhitelistOptions::default())
    }

    pub fn from_lines_with<I, S>(lines: I, options: WhitelistOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = lines
            .into_iter()
            .filter_map(|line| {
                let mut id = line.as_ref();
                if options.trim_start {
                    id = id.trim_start();
                }
                if options.trim_end {
                    id = id.trim_end();
                }
                if id.is_empty() {
                    return None;
                }
                Some(if options.ignore_case {
                    id.to_lowercase()
                } else {
                    id.to_string()
                })
            })
            .collect();

        Self {
            ids,
            ignore_case: options.ignore_case,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        if self.ignore_case {
            self.ids.contains(&id.to_lowercase())
        } else {
            self.ids.contains(id)
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
