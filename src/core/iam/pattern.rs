//! Path-glob matching of graph identifiers
//!
//! Graph IRIs are compared segment by segment, using `/` as the separator:
//! - `*` - Matches exactly one segment (e.g., `http://example.org/graphs/*`)
//! - `**` - Matches any number of segments, including none (e.g., `http://example.org/**`)
//! - `*` and `?` inside a segment match any run of characters / exactly one
//!   character of that segment (e.g., `team-*`, `v?`)
//!
//! Empty segments are ignored, so `http://host/a` splits into
//! `["http:", "host", "a"]`. `.` and `..` segments are resolved before matching
//! so a graph name cannot climb out of the subtree a pattern grants.

/// Glob matcher for graph identifiers
pub struct PatternMatcher;

impl PatternMatcher {
    /// Check if a graph identifier matches a policy pattern
    ///
    /// # Examples
    /// ```
    /// use quadguard::iam::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches(
    ///     "http://example.org/graphs/**",
    ///     "http://example.org/graphs/team1"
    /// ));
    /// assert!(PatternMatcher::matches("http://example.org/*/public", "http://example.org/a/public"));
    /// assert!(!PatternMatcher::matches("http://example.org/graphs/*", "http://example.org/other"));
    /// ```
    pub fn matches(pattern: &str, graph: &str) -> bool {
        let pattern = Self::segments(pattern);
        let graph = Self::segments(graph);

        Self::match_segments(&pattern, &graph)
    }

    /// Split into non-empty segments, resolving `.` and `..`
    fn segments(value: &str) -> Vec<&str> {
        let mut resolved = Vec::new();
        for segment in value.split('/').filter(|s| !s.is_empty()) {
            match segment {
                "." => {}
                ".." => {
                    resolved.pop();
                }
                _ => resolved.push(segment),
            }
        }
        resolved
    }

    /// Segment-level match, one row per pattern segment
    ///
    /// `reached[j]` holds when the pattern segments seen so far cover the
    /// first `j` graph segments. Each `**` is a single prefix pass, so the
    /// cost stays `O(pattern * graph)` however many `**` a pattern holds.
    fn match_segments(pattern: &[&str], graph: &[&str]) -> bool {
        let mut reached = vec![false; graph.len() + 1];
        reached[0] = true;

        for &head in pattern {
            if head == "**" {
                let mut seen = false;
                for slot in reached.iter_mut() {
                    seen |= *slot;
                    *slot = seen;
                }
                continue;
            }

            let mut next = vec![false; graph.len() + 1];
            for (j, segment) in graph.iter().enumerate() {
                next[j + 1] = reached[j] && Self::match_segment(head, segment);
            }
            if !next.contains(&true) {
                return false;
            }
            reached = next;
        }
        reached[graph.len()]
    }

    /// Match one pattern segment against one graph segment
    fn match_segment(pattern: &str, segment: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if !pattern.contains(['*', '?']) {
            return pattern == segment;
        }

        let pattern: Vec<char> = pattern.chars().collect();
        let segment: Vec<char> = segment.chars().collect();

        // Greedy scan with a single backtrack point at the last `*`
        let (mut p, mut s) = (0, 0);
        let mut star: Option<(usize, usize)> = None;
        while s < segment.len() {
            match pattern.get(p) {
                Some('?') => {
                    p += 1;
                    s += 1;
                }
                Some(&c) if c != '*' && c == segment[s] => {
                    p += 1;
                    s += 1;
                }
                Some('*') => {
                    star = Some((p, s));
                    p += 1;
                }
                _ => match star {
                    Some((star_p, star_s)) => {
                        p = star_p + 1;
                        s = star_s + 1;
                        star = Some((star_p, star_s + 1));
                    }
                    None => return false,
                },
            }
        }
        pattern[p..].iter().all(|&c| c == '*')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://example.org/graphs";

    fn g(path: &str) -> String {
        format!("{}/{}", BASE, path)
    }

    #[test]
    fn test_exact_match() {
        assert!(PatternMatcher::matches(&g("team1"), &g("team1")));
        assert!(!PatternMatcher::matches(&g("team1"), &g("team2")));
        assert!(PatternMatcher::matches("DEFAULT", "DEFAULT"));
    }

    #[test]
    fn test_single_wildcard() {
        assert!(PatternMatcher::matches(&g("*"), &g("team1")));
        assert!(!PatternMatcher::matches(&g("*"), &g("team1/sub")));
        assert!(!PatternMatcher::matches(&g("*"), "http://example.org/other/team1"));
    }

    #[test]
    fn test_recursive_wildcard() {
        assert!(PatternMatcher::matches(&g("**"), &g("team1")));
        assert!(PatternMatcher::matches(&g("**"), &g("team1/a/b/c")));
        // ** also matches zero segments
        assert!(PatternMatcher::matches(&g("**"), BASE));
        assert!(!PatternMatcher::matches(&g("**"), "http://example.org/other"));
    }

    #[test]
    fn test_recursive_wildcard_in_middle() {
        assert!(PatternMatcher::matches(&g("**/public"), &g("team1/public")));
        assert!(PatternMatcher::matches(&g("**/public"), &g("a/b/c/public")));
        assert!(!PatternMatcher::matches(&g("**/public"), &g("a/b/private")));
        assert!(PatternMatcher::matches(&g("**/**/public"), &g("public")));
    }

    #[test]
    fn test_match_everything() {
        assert!(PatternMatcher::matches("**", "http://anything/at/all"));
        assert!(PatternMatcher::matches("**", "DEFAULT"));
    }

    #[test]
    fn test_glob_inside_segment() {
        assert!(PatternMatcher::matches(&g("team-*"), &g("team-red")));
        assert!(!PatternMatcher::matches(&g("team-*"), &g("squad-red")));
        assert!(PatternMatcher::matches(&g("*-data"), &g("prod-data")));
        assert!(!PatternMatcher::matches(&g("*-data"), &g("data-prod")));
        assert!(PatternMatcher::matches(&g("*-*-*.ttl"), &g("app-prod-2024.ttl")));
        assert!(PatternMatcher::matches(&g("v?"), &g("v2")));
        assert!(!PatternMatcher::matches(&g("v?"), &g("v10")));
    }

    #[test]
    fn test_scheme_and_host_are_segments() {
        assert!(PatternMatcher::matches("http://*/graphs/a", "http://example.org/graphs/a"));
        assert!(!PatternMatcher::matches("https://example.org/**", &g("a")));
    }

    #[test]
    fn test_dot_segments_are_resolved() {
        // Climbing out of a granted subtree is not possible
        assert!(!PatternMatcher::matches(&g("public/**"), &g("public/../private/x")));
        assert!(PatternMatcher::matches(&g("private/**"), &g("public/../private/x")));
        assert!(PatternMatcher::matches(&g("team1"), &g("./team1")));
    }

    #[test]
    fn test_many_recursive_wildcards_stay_linear() {
        let graph = format!("http://example.org/{}", vec!["x"; 200].join("/"));

        let hit = format!("http://example.org/{}x", "**/".repeat(40));
        assert!(PatternMatcher::matches(&hit, &graph));

        // Backtracking over every split point would never finish here
        let miss = format!("http://example.org/{}y", "**/x/".repeat(40));
        assert!(!PatternMatcher::matches(&miss, &graph));

        let deep_miss = format!("http://example.org/{}", "**/".repeat(60)) + "y/**";
        assert!(!PatternMatcher::matches(&deep_miss, &graph));
    }

    #[test]
    fn test_trailing_and_duplicate_separators() {
        assert!(PatternMatcher::matches(&g("team1"), &format!("{}/", g("team1"))));
        assert!(PatternMatcher::matches(&g("*"), "http://example.org//graphs//team1"));
    }
}
