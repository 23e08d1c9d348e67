use std::collections::BTreeMap;

/// Immutable suffix trie over host names.
///
/// Hosts are stored back to front, so `g.doubleclick.net` walks
/// `t`, `e`, `n`, `.`, ... from the root. Children are kept sorted and
/// searched with a binary search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrieNode {
    keys: Box<[char]>,
    children: Box<[TrieNode]>,
    boundary: bool,
}

impl TrieNode {
    pub fn child(&self, c: char) -> Option<&TrieNode> {
        self.keys
            .binary_search(&c)
            .ok()
            .map(|index| &self.children[index])
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && !self.boundary
    }

    /// Whether `host` equals a listed host or is a subdomain of one.
    ///
    /// `xad.service.com` does not match `ad.service.com`: a listed suffix
    /// only counts when it ends at a label boundary.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.trim().trim_end_matches('.');
        let mut node = self;
        for (i, c) in host.char_indices().rev() {
            let Some(next) = node.child(c.to_ascii_lowercase()) else {
                return false;
            };
            node = next;
            if node.boundary && (i == 0 || host[..i].ends_with('.')) {
                return true;
            }
        }
        false
    }
}

/// Mutable builder, frozen into a [`TrieNode`] once all hosts are in.
#[derive(Debug, Default)]
pub struct TrieBuilder {
    children: BTreeMap<char, TrieBuilder>,
    boundary: bool,
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: &str) {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return;
        }
        let mut node = self;
        for c in host.chars().rev() {
            node = node.children.entry(c).or_default();
        }
        node.boundary = true;
    }

    /// Insert every host of a newline-delimited list.
    ///
    /// Blank lines and `#` comments are skipped. Lines in hosts-file form
    /// (`0.0.0.0 ads.example.com`) contribute their last field.
    pub fn extend_from_list(&mut self, list: &str) {
        for line in list.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if let Some(host) = line.split_whitespace().last() {
                self.insert(host);
            }
        }
    }

    pub fn build(self) -> TrieNode {
        let (keys, children): (Vec<char>, Vec<TrieNode>) = self
            .children
            .into_iter()
            .map(|(c, child)| (c, child.build()))
            .unzip();
        TrieNode {
            keys: keys.into_boxed_slice(),
            children: children.into_boxed_slice(),
            boundary: self.boundary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(hosts: &[&str]) -> TrieNode {
        let mut builder = TrieBuilder::new();
        for host in hosts {
            builder.insert(host);
        }
        builder.build()
    }

    #[test]
    fn test_subdomains_of_listed_host_match() {
        let t = trie(&["doubleclick.net", "ad.service.com"]);

        assert!(t.matches("doubleclick.net"));
        assert!(t.matches("g.doubleclick.net"));
        assert!(t.matches("a.b.doubleclick.net"));
        assert!(t.matches("ad.service.com"));
    }

    #[test]
    fn test_partial_labels_do_not_match() {
        let t = trie(&["doubleclick.net", "ad.service.com"]);

        assert!(!t.matches("service.com"));
        assert!(!t.matches("xad.service.com"));
        assert!(!t.matches("notdoubleclick.net"));
        assert!(!t.matches("net"));
    }

    #[test]
    fn test_matching_ignores_case() {
        let t = trie(&["Ads.Example.COM"]);
        assert!(t.matches("ads.example.com"));
        assert!(t.matches("CDN.ADS.EXAMPLE.COM"));
    }

    #[test]
    fn test_non_ascii_host_matches_itself() {
        let t = trie(&["Bücher.Example"]);
        assert!(t.matches("Bücher.Example"));
        assert!(t.matches("bücher.example"));
        assert!(t.matches("ADS.bücher.EXAMPLE"));
        assert!(!t.matches("bucher.example"));
    }

    #[test]
    fn test_list_parsing_skips_comments_and_blanks() {
        let mut builder = TrieBuilder::new();
        builder.extend_from_list(
            "# ad servers\n\n  tracker.io  \n0.0.0.0 pixel.example.org\nads.net # trailing\n",
        );
        let t = builder.build();

        assert!(t.matches("tracker.io"));
        assert!(t.matches("pixel.example.org"));
        assert!(t.matches("ads.net"));
        assert!(!t.matches("0.0.0.0"));
        assert!(!t.matches("example.org"));
    }

    #[test]
    fn test_empty_trie_matches_nothing() {
        let t = TrieBuilder::new().build();
        assert!(t.is_empty());
        assert!(!t.matches("anything.com"));
        assert!(!t.matches(""));
    }
}
