//! Search evaluators: per-parameter-type comparators.
//!
//! An evaluator turns each extracted field value into one or more comparison
//! strings (the query-token form of the value) and checks them against the
//! AND and OR terms of one search key. The store keeps an explicit
//! [`EvaluatorRegistry`] keyed by [`ParamType`]; callers can swap evaluators
//! in and out at runtime.

use crate::ParamType;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Comparator for one search parameter type.
pub trait SearchEvaluator: Send + Sync {
    /// The parameter type this evaluator handles.
    fn param_type(&self) -> ParamType;

    /// Convert an extracted value into the strings terms are compared against.
    fn comparison_values(&self, value: &Value) -> Vec<String>;

    /// Type-specific comparison of one query term against one comparison string.
    fn compare(&self, term: &str, value: &str) -> bool;

    /// Evaluate one search key against the values extracted from a record.
    ///
    /// No values never match. Every AND term must match some value; at least
    /// one OR term must match some value. Either list being empty leaves its
    /// clause satisfied.
    fn evaluate(&self, values: &[Value], ands: &[String], ors: &[String]) -> bool {
        if values.is_empty() {
            return false;
        }

        let comparison: Vec<String> = values
            .iter()
            .flat_map(|v| self.comparison_values(v))
            .collect();
        let matches = |term: &String| comparison.iter().any(|v| self.compare(term, v));

        ands.iter().all(|t| matches(t)) && (ors.is_empty() || ors.iter().any(|t| matches(t)))
    }
}

/// Prefix operators shared by the ordered types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl Prefix {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "gt" => Some(Prefix::Gt),
            "ge" => Some(Prefix::Ge),
            "lt" => Some(Prefix::Lt),
            "le" => Some(Prefix::Le),
            "ne" => Some(Prefix::Ne),
            _ => None,
        }
    }

    /// `operand` is the term without its prefix. Ordering is lexicographic.
    fn holds(self, operand: &str, value: &str) -> bool {
        match self {
            Prefix::Gt => operand < value,
            Prefix::Ge => operand <= value,
            Prefix::Lt => operand > value,
            Prefix::Le => operand >= value,
            Prefix::Ne => operand != value,
        }
    }
}

fn split_prefix(term: &str) -> Option<(&str, &str)> {
    Some((term.get(..2)?, term.get(2..)?))
}

/// Evaluator for `date` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateEvaluator;

impl SearchEvaluator for DateEvaluator {
    fn param_type(&self) -> ParamType {
        ParamType::Date
    }

    fn comparison_values(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            _ => vec![String::new()],
        }
    }

    fn compare(&self, term: &str, value: &str) -> bool {
        match term.chars().next() {
            None => false,
            Some(c) if c.is_ascii_digit() => term == value,
            Some(_) => match split_prefix(term) {
                Some((prefix, operand)) => match Prefix::parse(prefix) {
                    Some(Prefix::Ne) | None => false,
                    Some(p) => p.holds(operand, value),
                },
                None => false,
            },
        }
    }
}

/// Evaluator for `number` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberEvaluator;

impl SearchEvaluator for NumberEvaluator {
    fn param_type(&self) -> ParamType {
        ParamType::Number
    }

    fn comparison_values(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Number(n) => vec![n.to_string()],
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn compare(&self, term: &str, value: &str) -> bool {
        match term.chars().next() {
            None => false,
            Some(c) if c.is_alphabetic() => split_prefix(term)
                .and_then(|(prefix, operand)| Prefix::parse(prefix).map(|p| p.holds(operand, value)))
                .unwrap_or(false),
            Some(_) => term == value,
        }
    }
}

/// Coded sub-fields of complex string-searchable types (`HumanName.use`,
/// `Address.use`, `Address.type`). They hold codes, not text.
pub const CODED_STRING_FIELDS: &[&str] = &["use", "type"];

/// Evaluator for `string` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringEvaluator;

impl SearchEvaluator for StringEvaluator {
    fn param_type(&self) -> ParamType {
        ParamType::String
    }

    fn comparison_values(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            // complex types (HumanName, Address) are searched on their string parts
            Value::Object(fields) => {
                let mut out = Vec::new();
                let text_fields = fields
                    .iter()
                    .filter(|(name, _)| !CODED_STRING_FIELDS.contains(&name.as_str()));
                for (_, field) in text_fields {
                    match field {
                        Value::String(s) => out.push(s.clone()),
                        Value::Array(items) => out.extend(
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string),
                        ),
                        _ => {}
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }

    fn compare(&self, term: &str, value: &str) -> bool {
        term.to_lowercase() == value.to_lowercase()
    }
}

/// Evaluator for `token` parameters.
///
/// Stored values are rendered as `system|code`, or just `code` when there is
/// no system.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEvaluator;

impl TokenEvaluator {
    fn token(system: Option<&Value>, code: Option<&Value>) -> Option<String> {
        let code = code.and_then(scalar_text)?;
        match system.and_then(Value::as_str) {
            Some(system) => Some(format!("{}|{}", system, code)),
            None => Some(code),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn code_part(value: &str) -> &str {
    match value.find('|') {
        Some(index) => &value[index + 1..],
        None => value,
    }
}

impl SearchEvaluator for TokenEvaluator {
    fn param_type(&self) -> ParamType {
        ParamType::Token
    }

    fn comparison_values(&self, value: &Value) -> Vec<String> {
        let token = match value {
            Value::Object(obj) => {
                if let Some(codings) = obj.get("coding") {
                    // CodeableConcept: first coding only
                    let first = codings.as_array().and_then(|c| c.first());
                    first.and_then(|c| Self::token(c.get("system"), c.get("code")))
                } else if obj.contains_key("value") {
                    // Identifier, ContactPoint
                    Self::token(obj.get("system"), obj.get("value"))
                } else {
                    // Coding
                    Self::token(obj.get("system"), obj.get("code"))
                }
            }
            other => scalar_text(other),
        };

        token.into_iter().collect()
    }

    fn compare(&self, term: &str, value: &str) -> bool {
        if let Some(code) = term.strip_prefix('|') {
            code == code_part(value)
        } else if let Some(system) = term.strip_suffix('|') {
            match value.find('|') {
                Some(index) => system == &value[..index],
                None => false,
            }
        } else if term.contains('|') {
            term == value
        } else {
            term == code_part(value)
        }
    }
}

/// Evaluator for `reference` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEvaluator;

impl SearchEvaluator for ReferenceEvaluator {
    fn param_type(&self) -> ParamType {
        ParamType::Reference
    }

    fn comparison_values(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Object(obj) => obj
                .get("reference")
                .and_then(Value::as_str)
                .map(|r| vec![r.to_string()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn compare(&self, term: &str, value: &str) -> bool {
        if term.contains('/') || term.starts_with("http") {
            term == value
        } else {
            match value.rfind('/') {
                Some(index) => term == &value[index + 1..],
                None => term == value,
            }
        }
    }
}

/// Evaluators by parameter type.
pub struct EvaluatorRegistry {
    evaluators: HashMap<ParamType, Box<dyn SearchEvaluator>>,
}

impl EvaluatorRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// A registry holding the default date, number, string, token and
    /// reference evaluators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.reset();
        registry
    }

    /// Add an evaluator, replacing any existing one for the same type.
    pub fn register(&mut self, evaluator: Box<dyn SearchEvaluator>) {
        self.evaluators.insert(evaluator.param_type(), evaluator);
    }

    /// Restore the default evaluator set, dropping custom registrations.
    pub fn reset(&mut self) {
        self.evaluators.clear();
        self.register(Box::new(DateEvaluator));
        self.register(Box::new(StringEvaluator));
        self.register(Box::new(NumberEvaluator));
        self.register(Box::new(TokenEvaluator));
        self.register(Box::new(ReferenceEvaluator));
    }

    /// Get the evaluator for a parameter type.
    pub fn get(&self, param_type: ParamType) -> Option<&dyn SearchEvaluator> {
        self.evaluators.get(&param_type).map(|e| e.as_ref())
    }

    /// Check whether a parameter type has an evaluator.
    pub fn contains(&self, param_type: ParamType) -> bool {
        self.evaluators.contains_key(&param_type)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.evaluators.keys().map(|t| t.to_string()).collect();
        types.sort();
        f.debug_struct("EvaluatorRegistry")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_values_never_match() {
        assert!(!StringEvaluator.evaluate(&[], &[], &[]));
        assert!(!StringEvaluator.evaluate(&[], &terms(&["a"]), &[]));
    }

    #[test]
    fn empty_clauses_are_vacuously_true() {
        assert!(StringEvaluator.evaluate(&[json!("x")], &[], &[]));
    }

    #[test]
    fn and_terms_each_need_a_value() {
        let values = [json!("Jane"), json!("J.")];
        assert!(StringEvaluator.evaluate(&values, &terms(&["jane", "j."]), &[]));
        assert!(!StringEvaluator.evaluate(&values, &terms(&["jane", "frank"]), &[]));
    }

    #[test]
    fn or_terms_need_one_value() {
        let values = [json!("Jane")];
        assert!(StringEvaluator.evaluate(&values, &[], &terms(&["frank", "jane"])));
        assert!(!StringEvaluator.evaluate(&values, &[], &terms(&["frank", "john"])));
    }

    #[test]
    fn and_and_or_combine() {
        let values = [json!("Frank"), json!("F.")];
        assert!(StringEvaluator.evaluate(&values, &terms(&["f."]), &terms(&["frank", "franky"])));
        assert!(!StringEvaluator.evaluate(&values, &terms(&["z."]), &terms(&["frank", "franky"])));
        assert!(!StringEvaluator.evaluate(&values, &terms(&["f."]), &terms(&["franklin", "franky"])));
    }

    #[test]
    fn date_exact_and_prefixes() {
        let e = DateEvaluator;
        assert!(e.compare("2020-01-01", "2020-01-01"));
        assert!(!e.compare("2020-01-01", "2020-01-02"));

        assert!(e.compare("gt2020-01-01", "2020-06-01"));
        assert!(!e.compare("gt2020-01-01", "2020-01-01"));
        assert!(e.compare("ge2020-01-01", "2020-01-01"));
        assert!(e.compare("lt2020-01-01", "2019-12-31"));
        assert!(!e.compare("lt2020-01-01", "2020-01-01"));
        assert!(e.compare("le2020-01-01", "2020-01-01"));
    }

    #[test]
    fn date_unknown_prefix_and_short_terms() {
        let e = DateEvaluator;
        assert!(!e.compare("eq2020-01-01", "2020-01-01"));
        assert!(!e.compare("ne2020-01-01", "2019-01-01"));
        assert!(!e.compare("g", "2020"));
        assert!(!e.compare("", ""));
    }

    #[test]
    fn date_non_string_values_become_empty() {
        assert_eq!(DateEvaluator.comparison_values(&json!(5)), vec![String::new()]);
    }

    #[test]
    fn number_comparisons_are_lexicographic() {
        let e = NumberEvaluator;
        assert!(e.compare("22.1", "22.1"));
        assert!(e.compare("gt22.1", "62.6"));
        assert!(e.compare("ge22.1", "22.1"));
        assert!(e.compare("lt22.1", "1.22"));
        assert!(e.compare("le22.1", "22.1"));
        assert!(e.compare("ne22.1", "84.0"));
        assert!(!e.compare("ne22.1", "22.1"));
        // "9" sorts after "10" as text
        assert!(e.compare("gt10", "9"));
        assert!(!e.compare("xx10", "9"));
    }

    #[test]
    fn number_comparison_values() {
        assert_eq!(NumberEvaluator.comparison_values(&json!(22.1)), vec!["22.1"]);
        assert_eq!(NumberEvaluator.comparison_values(&json!(3)), vec!["3"]);
        assert!(NumberEvaluator.comparison_values(&json!(null)).is_empty());
    }

    #[test]
    fn string_is_case_insensitive_full_match() {
        let e = StringEvaluator;
        assert!(e.compare("doe", "Doe"));
        assert!(!e.compare("do", "Doe"));
    }

    #[test]
    fn string_values_from_complex_types() {
        let name = json!({"use": "official", "family": "Doe", "given": ["Jane", "J."], "period": {"start": "2000"}});
        let mut values = StringEvaluator.comparison_values(&name);
        values.sort();
        assert_eq!(values, vec!["Doe", "J.", "Jane"]);
        assert!(!StringEvaluator.evaluate(&[name], &terms(&["official"]), &[]));

        let address = json!({"use": "home", "type": "postal", "line": ["1 Main St"], "city": "Springfield"});
        let mut values = StringEvaluator.comparison_values(&address);
        values.sort();
        assert_eq!(values, vec!["1 Main St", "Springfield"]);
    }

    #[test]
    fn token_values() {
        let e = TokenEvaluator;
        let concept = json!({"coding": [{"system": "http://loinc.org", "code": "15074-8"}, {"code": "x"}]});
        assert_eq!(e.comparison_values(&concept), vec!["http://loinc.org|15074-8"]);

        let identifier = json!({"system": "urn:mrn", "value": "1234567"});
        assert_eq!(e.comparison_values(&identifier), vec!["urn:mrn|1234567"]);

        let coding = json!({"code": "AMB"});
        assert_eq!(e.comparison_values(&coding), vec!["AMB"]);

        assert_eq!(e.comparison_values(&json!(true)), vec!["true"]);
        assert_eq!(e.comparison_values(&json!("female")), vec!["female"]);
        assert!(e.comparison_values(&json!({"coding": []})).is_empty());
    }

    #[test]
    fn token_compare_forms() {
        let e = TokenEvaluator;
        // code only
        assert!(e.compare("1234567", "urn:mrn|1234567"));
        assert!(e.compare("female", "female"));
        // leading bar
        assert!(e.compare("|1234567", "urn:mrn|1234567"));
        assert!(e.compare("|female", "female"));
        // trailing bar
        assert!(e.compare("urn:mrn|", "urn:mrn|1234567"));
        assert!(!e.compare("urn:other|", "urn:mrn|1234567"));
        assert!(!e.compare("urn:mrn|", "1234567"));
        // full token
        assert!(e.compare("urn:mrn|1234567", "urn:mrn|1234567"));
        assert!(!e.compare("urn:mrn|7654321", "urn:mrn|1234567"));
    }

    #[test]
    fn reference_compare_forms() {
        let e = ReferenceEvaluator;
        assert!(e.compare("Patient/p-1", "Patient/p-1"));
        assert!(!e.compare("Patient/p-1", "Patient/p-2"));
        assert!(e.compare("p-1", "Patient/p-1"));
        assert!(e.compare("p-1", "p-1"));
        assert!(!e.compare("http://x/Patient/p-1", "Patient/p-1"));
        assert_eq!(
            e.comparison_values(&json!({"reference": "Patient/p-1", "display": "Jane"})),
            vec!["Patient/p-1"]
        );
    }

    #[test]
    fn registry_defaults_and_reset() {
        let mut registry = EvaluatorRegistry::with_defaults();
        for t in [
            ParamType::Date,
            ParamType::Number,
            ParamType::String,
            ParamType::Token,
            ParamType::Reference,
        ] {
            assert!(registry.contains(t), "missing {}", t);
        }
        assert!(!registry.contains(ParamType::Quantity));

        struct AlwaysQuantity;
        impl SearchEvaluator for AlwaysQuantity {
            fn param_type(&self) -> ParamType {
                ParamType::Quantity
            }
            fn comparison_values(&self, _value: &Value) -> Vec<String> {
                vec![String::new()]
            }
            fn compare(&self, _term: &str, _value: &str) -> bool {
                true
            }
        }

        registry.register(Box::new(AlwaysQuantity));
        assert!(registry.contains(ParamType::Quantity));

        registry.reset();
        assert!(!registry.contains(ParamType::Quantity));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_word() -> impl Strategy<Value = String> {
            "[a-c]{1,2}"
        }

        proptest! {
            #[test]
            fn prop_and_is_conjunction(
                values in prop::collection::vec(arb_word(), 1..4),
                ands in prop::collection::vec(arb_word(), 0..4),
            ) {
                let json: Vec<Value> = values.iter().map(|v| json!(v)).collect();
                let expected = ands.iter().all(|a| values.iter().any(|v| v == a));
                prop_assert_eq!(StringEvaluator.evaluate(&json, &ands, &[]), expected);
            }

            #[test]
            fn prop_or_is_disjunction(
                values in prop::collection::vec(arb_word(), 1..4),
                ors in prop::collection::vec(arb_word(), 1..4),
            ) {
                let json: Vec<Value> = values.iter().map(|v| json!(v)).collect();
                let expected = ors.iter().any(|o| values.iter().any(|v| v == o));
                prop_assert_eq!(StringEvaluator.evaluate(&json, &[], &ors), expected);
            }

            #[test]
            fn prop_mixed_is_and_of_clauses(
                values in prop::collection::vec(arb_word(), 1..4),
                ands in prop::collection::vec(arb_word(), 0..3),
                ors in prop::collection::vec(arb_word(), 0..3),
            ) {
                let json: Vec<Value> = values.iter().map(|v| json!(v)).collect();
                let and_only = StringEvaluator.evaluate(&json, &ands, &[]);
                let or_only = StringEvaluator.evaluate(&json, &[], &ors);
                prop_assert_eq!(StringEvaluator.evaluate(&json, &ands, &ors), and_only && or_only);
            }
        }
    }
}
