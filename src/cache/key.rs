//! Cache key construction.
//!
//! A key is the ordered concatenation of the placement identifier and the
//! ambient markers that would change the rendered markup: viewer segment
//! (for per-user caching), non-default style, non-default language,
//! non-guest timezone, a mobile marker and caller-supplied suffix tokens.
//! Part order and the delimiter are fixed so the key is deterministic.

const DELIMITER: &str = "_";

/// Builder over the fixed part order. Callers only set the parts that
/// differ from the site defaults; the pipeline does that comparison.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder<'a> {
    position: &'a str,
    user_segment: Option<u64>,
    style: Option<u32>,
    language: Option<u32>,
    timezone: Option<&'a str>,
    mobile: bool,
    suffix: &'a [String],
}

impl<'a> CacheKeyBuilder<'a> {
    pub fn new(position: &'a str) -> Self {
        Self {
            position,
            user_segment: None,
            style: None,
            language: None,
            timezone: None,
            mobile: false,
            suffix: &[],
        }
    }

    pub fn user_segment(mut self, segment: u64) -> Self {
        self.user_segment = Some(segment);
        self
    }

    pub fn style(mut self, style_id: u32) -> Self {
        self.style = Some(style_id);
        self
    }

    pub fn language(mut self, language_id: u32) -> Self {
        self.language = Some(language_id);
        self
    }

    pub fn timezone(mut self, timezone: &'a str) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn mobile(mut self) -> Self {
        self.mobile = true;
        self
    }

    pub fn suffix(mut self, suffix: &'a [String]) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn build(&self) -> String {
        let mut parts = vec![self.position.to_string()];
        if let Some(segment) = self.user_segment {
            parts.push(format!("pc{segment}"));
        }
        if let Some(style_id) = self.style {
            parts.push(format!("vs{style_id}"));
        }
        if let Some(language_id) = self.language {
            parts.push(format!("vl{language_id}"));
        }
        if let Some(timezone) = self.timezone {
            parts.push(format!("vt{timezone}"));
        }
        if self.mobile {
            parts.push("vm".to_string());
        }
        if !self.suffix.is_empty() {
            parts.push(format!("s{}", self.suffix.join(DELIMITER)));
        }
        parts.join(DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_key() -> String {
        CacheKeyBuilder::new("sidebar")
            .user_segment(4)
            .style(2)
            .language(3)
            .timezone("Europe/Rome")
            .mobile()
            .suffix(&["ajax".to_string()])
            .build()
    }

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(full_key(), full_key());
        assert_eq!(full_key(), "sidebar_pc4_vs2_vl3_vtEurope/Rome_vm_sajax");
    }

    #[test]
    fn each_part_changes_the_key() {
        let base = CacheKeyBuilder::new("sidebar").build();
        assert_eq!(base, "sidebar");

        let keys = [
            base.clone(),
            CacheKeyBuilder::new("footer").build(),
            CacheKeyBuilder::new("sidebar").user_segment(4).build(),
            CacheKeyBuilder::new("sidebar").style(2).build(),
            CacheKeyBuilder::new("sidebar").language(3).build(),
            CacheKeyBuilder::new("sidebar").timezone("UTC").build(),
            CacheKeyBuilder::new("sidebar").mobile().build(),
            CacheKeyBuilder::new("sidebar")
                .suffix(&["ajax".to_string()])
                .build(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "keys {i} and {j} collide");
                }
            }
        }
    }

    #[test]
    fn suffix_tokens_join_in_order() {
        let key = CacheKeyBuilder::new("hook")
            .suffix(&["tab".to_string(), "2".to_string()])
            .build();
        assert_eq!(key, "hook_stab_2");
    }
}
