//! Engineered feature derivation
//!
//! Derived columns are described by a declarative [`DerivationRule`] list
//! taken from the profile. Rules are pure functions of fields already in the
//! record; the deriver orders them so every rule runs after the rules whose
//! outputs it reads.
//!
//! Nulls propagate: a rule reading a missing value yields a missing value,
//! which the aligner's integrity check later rejects.

use crate::encoder::EncodingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace, warn};
use turnover_core::{Error, Record, Result, Value};

/// Operand of an arithmetic rule: a field name or a constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Const(f64),
    Field(String),
}

impl Operand {
    fn field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Const(_) => None,
        }
    }

    fn resolve(&self, record: &Record) -> Result<Option<f64>> {
        match self {
            Self::Const(v) => Ok(Some(*v)),
            Self::Field(name) => record.numeric(name),
        }
    }
}

/// Value an indicator matches
///
/// A category is written as the raw text (`equals: "yes"`) and turned into
/// the active encoder's code when the pipeline starts, so the rule does not
/// depend on any one encoder's class order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorTarget {
    Code(f64),
    Category(String),
}

/// One term of a weighted sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub source: String,
    pub weight: f64,
}

/// Comparison used by threshold flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(&self, value: f64, cutoff: f64) -> bool {
        match self {
            Self::Lt => value < cutoff,
            Self::Le => value <= cutoff,
            Self::Gt => value > cutoff,
            Self::Ge => value >= cutoff,
        }
    }
}

/// Which side of each bin interval is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinClosed {
    /// `[a, b)`; the last bin also includes its upper edge
    #[default]
    Left,
    /// `(a, b]`; the first bin also includes its lower edge
    Right,
}

/// Declarative derivation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivationRule {
    /// `numerator / (denominator + offset)`
    Ratio {
        name: String,
        numerator: Operand,
        denominator: Operand,
        #[serde(default)]
        offset: f64,
    },

    /// Product of all factors
    Product { name: String, factors: Vec<Operand> },

    /// Arithmetic mean of the sources
    Mean { name: String, sources: Vec<String> },

    /// Sum of `weight * source`
    WeightedSum { name: String, terms: Vec<WeightedTerm> },

    /// 1 when the source equals the given code or category, else 0
    Indicator {
        name: String,
        source: String,
        equals: IndicatorTarget,
    },

    /// 1 when `source op cutoff` holds, else 0
    Threshold {
        name: String,
        source: String,
        op: Comparison,
        cutoff: f64,
    },

    /// Index of the bin containing the source value
    Bin {
        name: String,
        source: String,
        edges: Vec<f64>,
        #[serde(default)]
        closed: BinClosed,
    },
}

impl DerivationRule {
    /// Output column name
    pub fn name(&self) -> &str {
        match self {
            Self::Ratio { name, .. }
            | Self::Product { name, .. }
            | Self::Mean { name, .. }
            | Self::WeightedSum { name, .. }
            | Self::Indicator { name, .. }
            | Self::Threshold { name, .. }
            | Self::Bin { name, .. } => name,
        }
    }

    /// Fields read by this rule
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => [numerator, denominator]
                .into_iter()
                .filter_map(Operand::field)
                .collect(),
            Self::Product { factors, .. } => factors.iter().filter_map(Operand::field).collect(),
            Self::Mean { sources, .. } => sources.iter().map(String::as_str).collect(),
            Self::WeightedSum { terms, .. } => terms.iter().map(|t| t.source.as_str()).collect(),
            Self::Indicator { source, .. }
            | Self::Threshold { source, .. }
            | Self::Bin { source, .. } => vec![source.as_str()],
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(Error::config(format!(
                "rule '{}': {}",
                self.name(),
                reason
            )))
        };

        match self {
            Self::Product { factors, .. } if factors.is_empty() => invalid("no factors"),
            Self::Mean { sources, .. } if sources.is_empty() => invalid("no sources"),
            Self::WeightedSum { terms, .. } if terms.is_empty() => invalid("no terms"),
            Self::Bin { edges, .. } if edges.len() < 2 => invalid("needs at least two edges"),
            Self::Bin { edges, .. } if edges.windows(2).any(|w| w[0] >= w[1]) => {
                invalid("edges must be strictly increasing")
            }
            _ => Ok(()),
        }
    }

    /// Turn a category-valued indicator into the code `encoding` assigns it
    pub fn resolve_categories(self, encoding: &EncodingStrategy) -> Result<Self> {
        match self {
            Self::Indicator {
                name,
                source,
                equals: IndicatorTarget::Category(category),
            } => {
                let code = encoding
                    .code_for(&source, &category)
                    .map_err(|e| Error::config(format!("rule '{}': {}", name, e)))?;
                debug!("Indicator {} matches {}={} as code {}", name, source, category, code);
                Ok(Self::Indicator {
                    name,
                    source,
                    equals: IndicatorTarget::Code(code as f64),
                })
            }
            other => Ok(other),
        }
    }

    /// Evaluate against the current record
    pub fn evaluate(&self, record: &Record) -> Result<Value> {
        let value = match self {
            Self::Ratio {
                numerator,
                denominator,
                offset,
                ..
            } => {
                match (numerator.resolve(record)?, denominator.resolve(record)?) {
                    (Some(n), Some(d)) if d + offset != 0.0 => Value::Float(n / (d + offset)),
                    _ => Value::Missing,
                }
            }
            Self::Product { factors, .. } => {
                let mut product = 1.0;
                for factor in factors {
                    match factor.resolve(record)? {
                        Some(v) => product *= v,
                        None => return Ok(Value::Missing),
                    }
                }
                Value::Float(product)
            }
            Self::Mean { sources, .. } => {
                let mut sum = 0.0;
                for source in sources {
                    match record.numeric(source)? {
                        Some(v) => sum += v,
                        None => return Ok(Value::Missing),
                    }
                }
                Value::Float(sum / sources.len() as f64)
            }
            Self::WeightedSum { terms, .. } => {
                let mut sum = 0.0;
                for term in terms {
                    match record.numeric(&term.source)? {
                        Some(v) => sum += v * term.weight,
                        None => return Ok(Value::Missing),
                    }
                }
                Value::Float(sum)
            }
            Self::Indicator {
                source,
                equals: IndicatorTarget::Code(code),
                ..
            } => match record.numeric(source)? {
                Some(v) => Value::flag(v == *code),
                None => Value::Missing,
            },
            Self::Indicator {
                source,
                equals: IndicatorTarget::Category(category),
                ..
            } => match record.get(source) {
                Some(Value::Text(text)) => Value::flag(text == category),
                Some(Value::Missing) => Value::Missing,
                Some(_) => {
                    return Err(Error::config(format!(
                        "rule '{}': category '{}' was never resolved to a code",
                        self.name(),
                        category
                    )))
                }
                None => return Err(Error::missing_attribute(source)),
            },
            Self::Threshold {
                source, op, cutoff, ..
            } => match record.numeric(source)? {
                Some(v) => Value::flag(op.holds(v, *cutoff)),
                None => Value::Missing,
            },
            Self::Bin {
                source,
                edges,
                closed,
                ..
            } => match record.numeric(source)? {
                Some(v) => bin_index(v, edges, *closed)
                    .map(|idx| Value::Int(idx as i64))
                    .unwrap_or(Value::Missing),
                None => Value::Missing,
            },
        };

        // Overflow or NaN inputs must not reach the classifier as numbers
        Ok(match value {
            Value::Float(v) if !v.is_finite() => Value::Missing,
            other => other,
        })
    }
}

/// Locate `value` within fixed bin edges
pub fn bin_index(value: f64, edges: &[f64], closed: BinClosed) -> Option<usize> {
    let last = edges.len().checked_sub(2)?;
    edges.windows(2).enumerate().find_map(|(i, w)| {
        let (lo, hi) = (w[0], w[1]);
        let inside = match closed {
            BinClosed::Left => value >= lo && (value < hi || (i == last && value == hi)),
            BinClosed::Right => (value > lo || (i == 0 && value == lo)) && value <= hi,
        };
        inside.then_some(i)
    })
}

/// Ordered, validated rule set
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    rules: Vec<DerivationRule>,
}

impl FeatureDeriver {
    /// Validate the rules and order them by dependency
    pub fn new(rules: Vec<DerivationRule>) -> Result<Self> {
        let mut names = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !names.insert(rule.name().to_string()) {
                return Err(Error::config(format!(
                    "derived feature '{}' defined twice",
                    rule.name()
                )));
            }
        }

        // Stable topological sort: keep declared order unless a dependency forces otherwise
        let mut pending = rules;
        let mut ordered: Vec<DerivationRule> = Vec::with_capacity(pending.len());
        let mut placed: HashSet<String> = HashSet::new();

        while !pending.is_empty() {
            let ready = pending.iter().position(|rule| {
                rule.inputs()
                    .iter()
                    .all(|input| !names.contains(*input) || placed.contains(*input))
            });

            match ready {
                Some(idx) => {
                    let rule = pending.remove(idx);
                    placed.insert(rule.name().to_string());
                    ordered.push(rule);
                }
                None => {
                    let stuck: Vec<_> = pending.iter().map(DerivationRule::name).collect();
                    return Err(Error::config(format!(
                        "circular dependency among derived features: {}",
                        stuck.join(", ")
                    )));
                }
            }
        }

        Ok(Self { rules: ordered })
    }

    /// Rules in execution order
    pub fn rules(&self) -> &[DerivationRule] {
        &self.rules
    }

    /// Names of all derived columns
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(DerivationRule::name)
    }

    /// Append derived features to the record
    pub fn derive(&self, record: &mut Record) -> Result<()> {
        for rule in &self.rules {
            let value = rule.evaluate(record)?;
            trace!("Derived {} = {}", rule.name(), value);
            record.insert(rule.name(), value);
        }
        Ok(())
    }
}

/// How engineered columns are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationMode {
    /// Compute every rule
    #[default]
    Compute,
    /// Fill engineered columns with fixed defaults instead of computing them
    Backfill,
}

/// Derivation section of a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivationSpec {
    /// Engineered feature rules
    #[serde(default)]
    pub rules: Vec<DerivationRule>,

    /// Backfill values overriding the numeric zero (e.g. a default category code)
    #[serde(default)]
    pub backfill_defaults: BTreeMap<String, Value>,
}

impl DerivationSpec {
    /// Copy of the spec with category indicators bound to `encoding`
    pub fn resolve_categories(&self, encoding: &EncodingStrategy) -> Result<Self> {
        let rules = self
            .rules
            .iter()
            .cloned()
            .map(|rule| rule.resolve_categories(encoding))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            backfill_defaults: self.backfill_defaults.clone(),
        })
    }
}

/// Derivation policy, fixed at startup
#[derive(Debug, Clone)]
pub enum DerivationPolicy {
    Compute(FeatureDeriver),
    Backfill(BTreeMap<String, Value>),
}

impl DerivationPolicy {
    /// Build the policy for the selected mode
    pub fn build(spec: &DerivationSpec, mode: DerivationMode) -> Result<Self> {
        let deriver = FeatureDeriver::new(spec.rules.clone())?;

        match mode {
            DerivationMode::Compute => Ok(Self::Compute(deriver)),
            DerivationMode::Backfill => {
                let mut defaults: BTreeMap<String, Value> = deriver
                    .outputs()
                    .map(|name| (name.to_string(), Value::Int(0)))
                    .collect();
                for (name, value) in &spec.backfill_defaults {
                    if value.as_f64().is_none() {
                        return Err(Error::config(format!(
                            "backfill default for '{}' must be numeric",
                            name
                        )));
                    }
                    defaults.insert(name.clone(), value.clone());
                }

                warn!(
                    "Derivation backfill mode: {} engineered columns use fixed defaults instead of computed values",
                    defaults.len()
                );
                Ok(Self::Backfill(defaults))
            }
        }
    }

    pub fn mode(&self) -> DerivationMode {
        match self {
            Self::Compute(_) => DerivationMode::Compute,
            Self::Backfill(_) => DerivationMode::Backfill,
        }
    }

    /// Add engineered columns to the record
    pub fn apply(&self, record: &mut Record) -> Result<()> {
        match self {
            Self::Compute(deriver) => deriver.derive(record),
            Self::Backfill(defaults) => {
                for (name, value) in defaults {
                    if !record.contains(name) {
                        record.insert(name.clone(), value.clone());
                    }
                }
                Ok(())
            }
        }
    }
}
