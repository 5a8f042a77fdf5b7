use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ValidationError;

/// What the device does with matching traffic.
///
/// Parsing is strict: a value outside this set is a [`ValidationError`],
/// never a silent default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Allow,
    Deny,
    Drop,
    ResetClient,
    ResetServer,
    ResetBoth,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Allow,
        Action::Deny,
        Action::Drop,
        Action::ResetClient,
        Action::ResetServer,
        Action::ResetBoth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Drop => "drop",
            Action::ResetClient => "reset-client",
            Action::ResetServer => "reset-server",
            Action::ResetBoth => "reset-both",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAction {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Action {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    #[default]
    Universal,
    Intrazone,
    Interzone,
}

fn default_true() -> bool {
    true
}

/// One security rule.
///
/// Position is NOT part of the rule: it belongs to the [`RuleList`] that
/// holds it. Unknown keys are refused at parse time so a misspelled field
/// cannot silently drop out of change detection; device fields without a
/// dedicated slot go under `extra`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub source_zone: Vec<String>,
    #[serde(default)]
    pub source_address: Vec<String>,
    #[serde(default)]
    pub negate_source: bool,
    #[serde(default)]
    pub source_user: Vec<String>,
    #[serde(default)]
    pub hip_profile: Vec<String>,
    #[serde(default)]
    pub destination_zone: Vec<String>,
    #[serde(default)]
    pub destination_address: Vec<String>,
    #[serde(default)]
    pub negate_destination: bool,
    #[serde(default)]
    pub application: Vec<String>,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,

    pub action: Action,
    #[serde(default)]
    pub log_setting: String,
    #[serde(default)]
    pub log_start: bool,
    #[serde(default = "default_true")]
    pub log_end: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub icmp_unreachable: bool,
    #[serde(default)]
    pub disable_server_response_inspection: bool,
    #[serde(default)]
    pub profile_group: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Match-criteria lists that the device requires to be non-empty
/// (`any` is the explicit wildcard).
pub const REQUIRED_MATCH_FIELDS: [&str; 9] = [
    "source_zone",
    "source_address",
    "source_user",
    "hip_profile",
    "destination_zone",
    "destination_address",
    "application",
    "service",
    "category",
];

impl Rule {
    /// A rule matching everything, with `action` applied.
    ///
    /// Lists default to the device wildcards (`any`, and
    /// `application-default` for service).
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        let any = || vec!["any".to_string()];
        Self {
            name: name.into(),
            description: String::new(),
            rule_type: RuleType::Universal,
            tags: Vec::new(),
            source_zone: any(),
            source_address: any(),
            negate_source: false,
            source_user: any(),
            hip_profile: any(),
            destination_zone: any(),
            destination_address: any(),
            negate_destination: false,
            application: any(),
            service: vec!["application-default".to_string()],
            category: any(),
            action,
            log_setting: String::new(),
            log_start: false,
            log_end: true,
            disabled: false,
            schedule: String::new(),
            icmp_unreachable: false,
            disable_server_response_inspection: false,
            profile_group: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Required match lists paired with their field names, in
    /// [`REQUIRED_MATCH_FIELDS`] order.
    pub fn match_lists(&self) -> [(&'static str, &Vec<String>); 9] {
        [
            ("source_zone", &self.source_zone),
            ("source_address", &self.source_address),
            ("source_user", &self.source_user),
            ("hip_profile", &self.hip_profile),
            ("destination_zone", &self.destination_zone),
            ("destination_address", &self.destination_address),
            ("application", &self.application),
            ("service", &self.service),
            ("category", &self.category),
        ]
    }

    fn lists_mut(&mut self) -> [&mut Vec<String>; 10] {
        [
            &mut self.tags,
            &mut self.source_zone,
            &mut self.source_address,
            &mut self.source_user,
            &mut self.hip_profile,
            &mut self.destination_zone,
            &mut self.destination_address,
            &mut self.application,
            &mut self.service,
            &mut self.category,
        ]
    }

    /// Copy with every list field sorted. Duplicates are kept, so two rules
    /// are canonically equal only if their lists are equal as multisets.
    pub fn canonicalized(&self) -> Rule {
        let mut out = self.clone();
        for list in out.lists_mut() {
            list.sort();
        }
        out
    }

    /// Flat `field -> value` view of the rule.
    ///
    /// Entries of `extra` appear as `extra.<key>`. Diffing walks this view,
    /// so a field added to the struct participates without further code.
    pub fn fields(&self) -> BTreeMap<String, Value> {
        // A struct of strings, lists, bools and a string-keyed map always
        // serializes to a JSON object.
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return BTreeMap::new();
        };

        let mut out = BTreeMap::new();
        for (k, v) in map {
            if k == "extra" {
                if let Value::Object(extra) = v {
                    for (ek, ev) in extra {
                        out.insert(format!("extra.{ek}"), ev);
                    }
                }
                continue;
            }
            out.insert(k, v);
        }
        out
    }
}

/// Structural equality, element order within lists included.
pub fn equals(a: &Rule, b: &Rule) -> bool {
    a == b
}

/// An ordered sequence of rules with unique names.
///
/// Construction does not validate; run [`crate::validate_rule_list`] before
/// handing a declared list to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleList {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new(rules)
    }
}

impl FromIterator<Rule> for RuleList {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
