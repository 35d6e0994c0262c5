// Classification filtering: request shape plus the pure post-filter

use serde::{Deserialize, Serialize};

use crate::reference::types::{
    ContentType, Persona, SalesStage, SlideClassification, SlideLayout, VisualStyle,
};

/// A filter field accepts a single value or a list of acceptable values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn values(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn contains(&self, candidate: &T) -> bool
    where
        T: PartialEq,
    {
        self.values().contains(candidate)
    }
}

/// Structured filter over classification metadata. Scalar enum fields
/// run server-side where the coordinator can; `visual_elements` and
/// anything that spilled past the provider's `in` limit are evaluated
/// here, client-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<OneOrMany<ContentType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<OneOrMany<SlideLayout>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_style: Option<OneOrMany<VisualStyle>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<OneOrMany<Persona>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_stage: Option<OneOrMany<SalesStage>>,
    /// Any-of semantics: a slide matches when it carries at least one
    /// of the requested tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_elements: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_metrics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_quote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_logo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_product_ui: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_people: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_process: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_bullets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_call_to_action: Option<bool>,
}

impl ClassificationFilters {
    pub fn is_empty(&self) -> bool {
        self.scalar_predicates().is_empty() && self.visual_elements.is_none()
    }

    /// Scalar predicates the metadata store can evaluate server-side,
    /// as (dotted field path, acceptable JSON values) pairs.
    pub fn scalar_predicates(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        let mut predicates = Vec::new();

        fn push_enum<T: Serialize>(
            predicates: &mut Vec<(String, Vec<serde_json::Value>)>,
            field: &str,
            filter: &Option<OneOrMany<T>>,
        ) {
            if let Some(filter) = filter {
                let values = filter
                    .values()
                    .iter()
                    .filter_map(|v| serde_json::to_value(v).ok())
                    .collect::<Vec<_>>();
                if !values.is_empty() {
                    predicates.push((format!("classification.{}", field), values));
                }
            }
        }

        push_enum(&mut predicates, "contentType", &self.content_type);
        push_enum(&mut predicates, "layout", &self.layout);
        push_enum(&mut predicates, "visualStyle", &self.visual_style);
        push_enum(&mut predicates, "persona", &self.persona);
        push_enum(&mut predicates, "salesStage", &self.sales_stage);

        let hints: [(&str, Option<bool>); 8] = [
            ("hasMetrics", self.has_metrics),
            ("hasQuote", self.has_quote),
            ("hasLogo", self.has_logo),
            ("hasProductUi", self.has_product_ui),
            ("hasPeople", self.has_people),
            ("hasProcess", self.has_process),
            ("hasBullets", self.has_bullets),
            ("hasCallToAction", self.has_call_to_action),
        ];
        for (field, value) in hints {
            if let Some(value) = value {
                predicates.push((
                    format!("classification.contentHints.{}", field),
                    vec![serde_json::Value::Bool(value)],
                ));
            }
        }

        predicates
    }

    /// The post-filter itself. A record with no classification passes
    /// every predicate: absence of metadata must never silently exclude
    /// older slides.
    pub fn matches(&self, classification: Option<&SlideClassification>) -> bool {
        let Some(c) = classification else {
            return true;
        };

        if let Some(filter) = &self.content_type {
            if !filter.contains(&c.content_type) {
                return false;
            }
        }
        if let Some(filter) = &self.layout {
            if !filter.contains(&c.layout) {
                return false;
            }
        }
        if let Some(filter) = &self.visual_style {
            if !filter.contains(&c.visual_style) {
                return false;
            }
        }
        if let Some(filter) = &self.persona {
            if !filter.contains(&c.persona) {
                return false;
            }
        }
        if let Some(filter) = &self.sales_stage {
            if !filter.contains(&c.sales_stage) {
                return false;
            }
        }

        if let Some(tags) = &self.visual_elements {
            let any_match = tags
                .values()
                .iter()
                .any(|tag| c.visual_elements.iter().any(|e| e == tag));
            if !any_match {
                return false;
            }
        }

        let hints = &c.content_hints;
        let hint_checks: [(Option<bool>, bool); 8] = [
            (self.has_metrics, hints.has_metrics),
            (self.has_quote, hints.has_quote),
            (self.has_logo, hints.has_logo),
            (self.has_product_ui, hints.has_product_ui),
            (self.has_people, hints.has_people),
            (self.has_process, hints.has_process),
            (self.has_bullets, hints.has_bullets),
            (self.has_call_to_action, hints.has_call_to_action),
        ];
        for (wanted, actual) in hint_checks {
            if let Some(wanted) = wanted {
                if wanted != actual {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::types::ContentHints;

    fn classification_with_tags(tags: &[&str]) -> SlideClassification {
        SlideClassification {
            content_type: ContentType::Proof,
            layout: SlideLayout::ChartFocus,
            visual_style: VisualStyle::DataHeavy,
            persona: Persona::Executive,
            sales_stage: SalesStage::Evaluation,
            visual_elements: tags.iter().map(|t| t.to_string()).collect(),
            content_hints: ContentHints {
                has_metrics: true,
                ..Default::default()
            },
            confidence: 0.9,
            dominant_colors: vec![],
            extracted_title: None,
            keywords: None,
        }
    }

    #[test]
    fn test_unclassified_record_passes_every_filter() {
        let filters = ClassificationFilters {
            content_type: Some(OneOrMany::One(ContentType::Title)),
            has_metrics: Some(true),
            visual_elements: Some(OneOrMany::One("charts".to_string())),
            ..Default::default()
        };
        assert!(filters.matches(None));
    }

    #[test]
    fn test_visual_elements_any_of() {
        let filters = ClassificationFilters {
            visual_elements: Some(OneOrMany::Many(vec![
                "charts".to_string(),
                "table".to_string(),
            ])),
            ..Default::default()
        };
        assert!(filters.matches(Some(&classification_with_tags(&["charts"]))));
        assert!(filters.matches(Some(&classification_with_tags(&["table", "photo"]))));
        assert!(!filters.matches(Some(&classification_with_tags(&["photo"]))));
    }

    #[test]
    fn test_enum_filter_single_and_list() {
        let single = ClassificationFilters {
            content_type: Some(OneOrMany::One(ContentType::Proof)),
            ..Default::default()
        };
        assert!(single.matches(Some(&classification_with_tags(&[]))));

        let list = ClassificationFilters {
            content_type: Some(OneOrMany::Many(vec![ContentType::Title, ContentType::Team])),
            ..Default::default()
        };
        assert!(!list.matches(Some(&classification_with_tags(&[]))));
    }

    #[test]
    fn test_content_hint_exact_match() {
        let wants_metrics = ClassificationFilters {
            has_metrics: Some(true),
            ..Default::default()
        };
        assert!(wants_metrics.matches(Some(&classification_with_tags(&[]))));

        let wants_no_metrics = ClassificationFilters {
            has_metrics: Some(false),
            ..Default::default()
        };
        assert!(!wants_no_metrics.matches(Some(&classification_with_tags(&[]))));
    }

    #[test]
    fn test_filter_deserializes_single_or_list() {
        let parsed: ClassificationFilters =
            serde_json::from_str(r#"{"contentType": "proof"}"#).unwrap();
        assert!(matches!(
            parsed.content_type,
            Some(OneOrMany::One(ContentType::Proof))
        ));

        let parsed: ClassificationFilters =
            serde_json::from_str(r#"{"contentType": ["proof", "title"], "hasBullets": false}"#)
                .unwrap();
        assert!(matches!(parsed.content_type, Some(OneOrMany::Many(_))));
        assert_eq!(parsed.has_bullets, Some(false));
    }

    #[test]
    fn test_scalar_predicates_field_paths() {
        let filters = ClassificationFilters {
            content_type: Some(OneOrMany::One(ContentType::Proof)),
            has_metrics: Some(true),
            visual_elements: Some(OneOrMany::One("charts".to_string())),
            ..Default::default()
        };
        let predicates = filters.scalar_predicates();
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[0].0, "classification.contentType");
        assert_eq!(predicates[0].1, vec![serde_json::json!("proof")]);
        assert_eq!(predicates[1].0, "classification.contentHints.hasMetrics");
    }

    #[test]
    fn test_is_empty() {
        assert!(ClassificationFilters::default().is_empty());
        let filters = ClassificationFilters {
            visual_elements: Some(OneOrMany::One("charts".to_string())),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }
}
