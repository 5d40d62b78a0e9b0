//! Placement override rules
//!
//! A rule binds a glob pattern to a comma-separated list of directives:
//!
//! ```text
//! <glob>=<directive>[,<directive>...]
//!
//!   p:<partition>   place the file in a named partition
//!   o:<offset>      offset inside that partition (default 0)
//!   g:<n> | g:max   growth quantum, or one whole target partition
//!   r:<address>     raw absolute flash address, no partition lookup
//! ```
//!
//! Rules are tried in declaration order and the first match wins.

use crate::error::{PackError, Result};
use crate::pattern::{GlobPattern, PathMatcher};
use crate::validation::parse_int;
use serde::Serialize;
use tracing::warn;

/// Growth policy attached to a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowSize {
    /// Round the allocation up to a multiple of this many bytes
    Quantum(u64),
    /// Round up to the full size of the rule's target partition
    WholePartition,
}

/// A single `<glob>=<directives>` override
#[derive(Debug, Clone)]
pub struct PlacementRule {
    pattern: GlobPattern,
    expression: String,

    /// Target partition name (`p:`)
    pub partition: Option<String>,

    /// Offset inside the target partition (`o:`)
    pub offset: Option<u64>,

    /// Growth policy (`g:`)
    pub grow: Option<GrowSize>,

    /// Raw absolute address (`r:`)
    pub raw_offset: Option<u64>,
}

impl PlacementRule {
    /// Parse one rule expression
    ///
    /// # Examples
    ///
    /// ```
    /// use ffs_pack::core::rule::{GrowSize, PlacementRule};
    ///
    /// let rule = PlacementRule::parse("*.bin=p:storage,o:0x1000").unwrap();
    /// assert_eq!(rule.partition.as_deref(), Some("storage"));
    /// assert_eq!(rule.offset, Some(0x1000));
    ///
    /// let rule = PlacementRule::parse("big.dat=g:max,p:extra").unwrap();
    /// assert_eq!(rule.grow, Some(GrowSize::WholePartition));
    /// ```
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let (glob, directives) = expression
            .rsplit_once('=')
            .ok_or_else(|| PackError::rule(expression, "expected <glob>=<directives>"))?;

        let pattern = GlobPattern::new(glob)
            .map_err(|_| PackError::rule(expression, "empty glob pattern"))?;

        let mut rule = PlacementRule {
            pattern,
            expression: expression.to_string(),
            partition: None,
            offset: None,
            grow: None,
            raw_offset: None,
        };

        for directive in directives.split(',').map(str::trim) {
            if directive.is_empty() {
                continue;
            }
            rule.apply_directive(directive)?;
        }

        rule.validate()?;
        Ok(rule)
    }

    fn apply_directive(&mut self, directive: &str) -> Result<()> {
        let expression = self.expression.clone();
        let (key, value) = match directive.split_once(':') {
            Some((key, value)) if key.len() == 1 => (key, value.trim()),
            _ => {
                return Err(PackError::rule(
                    expression,
                    format!("malformed directive '{}'", directive),
                ))
            }
        };

        let number = |value: &str| {
            parse_int(value).map_err(|_| {
                PackError::rule(
                    &expression,
                    format!("invalid number in directive '{}'", directive),
                )
            })
        };

        match key {
            "p" => {
                if value.is_empty() {
                    return Err(PackError::rule(&expression, "empty partition name"));
                }
                self.partition = Some(value.to_string());
            }
            "o" => self.offset = Some(number(value)?),
            "g" => {
                self.grow = Some(if value.eq_ignore_ascii_case("max") {
                    GrowSize::WholePartition
                } else {
                    match number(value)? {
                        0 => {
                            return Err(PackError::rule(
                                &expression,
                                "growth quantum must be positive",
                            ))
                        }
                        quantum => GrowSize::Quantum(quantum),
                    }
                });
            }
            "r" => self.raw_offset = Some(number(value)?),
            other => {
                return Err(PackError::rule(
                    &expression,
                    format!("unknown directive '{}:'", other),
                ))
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.partition.is_none() && self.offset.is_some() && self.raw_offset.is_none() {
            return Err(PackError::rule(
                &self.expression,
                "o: needs a target partition (p:)",
            ));
        }

        if self.grow == Some(GrowSize::WholePartition) && self.partition.is_none() {
            return Err(PackError::rule(
                &self.expression,
                "g:max needs a target partition (p:)",
            ));
        }

        if self.partition.is_some() && self.raw_offset.is_some() {
            warn!(
                "Rule '{}' names a partition and a raw offset; the raw offset takes precedence",
                self.expression
            );
        }

        Ok(())
    }

    /// The glob pattern as written
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// The full rule expression as written
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl PathMatcher for PlacementRule {
    fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

/// Ordered list of placement rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PlacementRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules from a flat argument list
    ///
    /// An argument holding several space-separated expressions yields one
    /// rule per expression, in order.
    pub fn parse_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = RuleSet::new();
        for arg in args {
            for expression in arg.as_ref().split_whitespace() {
                set.push(PlacementRule::parse(expression)?);
            }
        }
        Ok(set)
    }

    pub fn push(&mut self, rule: PlacementRule) {
        self.rules.push(rule);
    }

    /// First rule, in declaration order, whose pattern matches `path`
    pub fn first_match(&self, path: &str) -> Option<&PlacementRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Partition names referenced by any rule
    pub fn partition_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| rule.partition.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacementRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partition_rule() {
        let rule = PlacementRule::parse("*.bin=p:storage,o:0x1000").unwrap();
        assert_eq!(rule.pattern(), "*.bin");
        assert_eq!(rule.partition.as_deref(), Some("storage"));
        assert_eq!(rule.offset, Some(0x1000));
        assert_eq!(rule.grow, None);
        assert_eq!(rule.raw_offset, None);
    }

    #[test]
    fn test_parse_growth_variants() {
        let rule = PlacementRule::parse("log.txt=g:0x2000").unwrap();
        assert_eq!(rule.grow, Some(GrowSize::Quantum(0x2000)));
        assert!(rule.partition.is_none());

        let rule = PlacementRule::parse("big.dat=g:max,p:extra").unwrap();
        assert_eq!(rule.grow, Some(GrowSize::WholePartition));
        assert_eq!(rule.partition.as_deref(), Some("extra"));
    }

    #[test]
    fn test_parse_raw_rule() {
        let rule = PlacementRule::parse("boot.img=r:0x1000,g:4096").unwrap();
        assert_eq!(rule.raw_offset, Some(0x1000));
        assert_eq!(rule.grow, Some(GrowSize::Quantum(4096)));
    }

    #[test]
    fn test_glob_may_contain_equals() {
        let rule = PlacementRule::parse("a=b.txt=p:nvs").unwrap();
        assert_eq!(rule.pattern(), "a=b.txt");
        assert!(rule.matches("a=b.txt"));
    }

    #[test]
    fn test_invalid_rules() {
        for expr in [
            "no-equals-sign",
            "=p:storage",
            "x.bin=p:",
            "x.bin=z:1",
            "x.bin=partition",
            "x.bin=pp:storage",
            "x.bin=g:0",
            "x.bin=g:lots",
            "x.bin=g:max",
            "x.bin=o:0x1000",
            "x.bin=r:addr",
        ] {
            let result = PlacementRule::parse(expr);
            assert!(
                matches!(result, Err(PackError::InvalidRule { .. })),
                "expected '{}' to be rejected, got {:?}",
                expr,
                result
            );
        }
    }

    #[test]
    fn test_empty_directives_are_skipped() {
        let rule = PlacementRule::parse("x.bin=p:nvs,,o:16,").unwrap();
        assert_eq!(rule.partition.as_deref(), Some("nvs"));
        assert_eq!(rule.offset, Some(16));
    }

    #[test]
    fn test_first_match_wins() {
        let rules =
            RuleSet::parse_args(["*.bin=p:storage", "ota0.bin=p:ota_0", "*=g:8192"]).unwrap();
        assert_eq!(rules.len(), 3);

        let hit = rules.first_match("ota0.bin").unwrap();
        assert_eq!(hit.partition.as_deref(), Some("storage"));

        let hit = rules.first_match("notes.txt").unwrap();
        assert_eq!(hit.grow, Some(GrowSize::Quantum(8192)));
    }

    #[test]
    fn test_space_separated_arguments() {
        let rules = RuleSet::parse_args(["a.bin=p:x b.bin=p:y", "c.bin=r:0x10"]).unwrap();
        let patterns: Vec<&str> = rules.iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns, vec!["a.bin", "b.bin", "c.bin"]);

        let names: Vec<&str> = rules.partition_names().collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
