use radix_trie::{Trie, TrieCommon};

/// DNS-suffix matcher; a suffix only matches on a label boundary.
#[derive(Clone)]
pub struct HostMatcher(Trie<String, ()>);

impl HostMatcher {
    pub fn matches(&self, host: &str) -> bool {
        let rev_dn: String = host.chars().rev().collect();
        let mut end = rev_dn.len();
        while end > 0 {
            let Some(node) = self.0.get_ancestor(&rev_dn[..end]) else {
                break;
            };
            if let (Some(key), Some(_)) = (node.key(), node.value()) {
                let len = key.len();
                if len == rev_dn.len() || rev_dn.as_bytes()[len] == b'.' {
                    return true;
                }
                // a shorter suffix may still end on a boundary
                end = len;
            }
            if end == 0 {
                break;
            }
            end -= 1;
            while !rev_dn.is_char_boundary(end) {
                end -= 1;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct HostMatcherBuilder(Vec<(String, ())>);

impl HostMatcherBuilder {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add_suffix(&mut self, host: &str) {
        self.0.push((host.chars().rev().collect(), ()))
    }

    pub fn build(self) -> HostMatcher {
        HostMatcher(Trie::from_iter(self.0))
    }
}

#[test]
fn test_matcher() {
    let mut builder = HostMatcherBuilder::new();
    builder.add_suffix("telemetry.google.com");
    builder.add_suffix("analytics.google.com");
    builder.add_suffix("test.google.com");
    let matcher = builder.build();
    assert!(!matcher.matches("google.com"));
    assert!(matcher.matches("telemetry.google.com"));
    assert!(matcher.matches("t-01.telemetry.google.com"));
    assert!(matcher.matches("t-02.test.google.com"));
    assert!(!matcher.matches("notgoogle.com"));
    assert!(!matcher.matches("me.notgoogle.com"));
    assert!(!matcher.matches("ogle.com"));
    let mut builder = HostMatcherBuilder::new();
    builder.add_suffix("ogle.com");
    let matcher = builder.build();
    assert!(matcher.matches("hi.ogle.com"));
    assert!(!matcher.matches("google.com"));
    assert!(!matcher.matches("hi.google.com"));
}

#[test]
fn test_nested_suffixes() {
    let mut builder = HostMatcherBuilder::new();
    builder.add_suffix("example.com");
    builder.add_suffix("a.example.com");
    let matcher = builder.build();
    // longest candidate "a.example.com" misses the boundary, "example.com" still hits
    assert!(matcher.matches("xa.example.com"));
    assert!(matcher.matches("a.example.com"));
    assert!(!matcher.matches("evilexample.com"));
    assert!(!HostMatcherBuilder::new().build().matches("example.com"));
    assert!(HostMatcherBuilder::new().build().is_empty());
}
