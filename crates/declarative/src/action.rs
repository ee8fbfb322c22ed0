//! Per-option units of work.

use crate::option::{OptionSpec, by_weight};
use crate::value::Value;
use std::fmt;

/// One option whose desired value differs from the observed one.
///
/// Created fresh for every reconciliation pass.
pub struct OptionAction<B: ?Sized + 'static> {
    pub option: &'static OptionSpec<B>,
    /// Observed value, `None` when unset
    pub from: Option<Value>,
    /// Desired value
    pub to: Option<Value>,
}

impl<B: ?Sized + 'static> OptionAction<B> {
    pub fn name(&self) -> &'static str {
        self.option.name
    }

    /// Human-readable summary of the change.
    pub fn describe(&self) -> String {
        format!(
            "Set {}: {} ==> {}",
            self.option.name,
            self.option.display(self.from.as_ref()),
            self.option.display(self.to.as_ref())
        )
    }
}

impl<B: ?Sized + 'static> fmt::Debug for OptionAction<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionAction")
            .field("option", &self.option.name)
            .field("from", &self.option.display(self.from.as_ref()))
            .field("to", &self.option.display(self.to.as_ref()))
            .finish()
    }
}

/// Compute the actions for one entity, in execution order.
///
/// Options without a desired value express no opinion and yield nothing.
/// The observed value falls back to the option default before comparing.
pub fn plan<B, I, D, F>(options: I, desired: D, observed: F) -> Vec<OptionAction<B>>
where
    B: ?Sized + 'static,
    I: IntoIterator<Item = &'static OptionSpec<B>>,
    D: Fn(&str) -> Option<Value>,
    F: Fn(&str) -> Option<Value>,
{
    let mut ordered: Vec<&'static OptionSpec<B>> = options.into_iter().collect();
    ordered.sort_by(|a, b| by_weight(*a, *b));

    ordered
        .into_iter()
        .filter_map(|option| {
            let to = desired(option.name)?;
            let from = observed(option.name);
            option.differs(from.as_ref(), &to).then(|| OptionAction {
                option,
                from,
                to: Some(to),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::ValueKind;
    use std::collections::BTreeMap;

    struct Plain;

    type Spec = OptionSpec<Plain>;

    static OPTIONS: &[Spec] = &[
        Spec::new("started", "running", &Plain)
            .prio(99)
            .kind(ValueKind::Bool)
            .default("true"),
        Spec::new("port", "listen port", &Plain).default("389"),
        Spec::new("state", "entity state", &Plain).prio(2),
        Spec::new("rootpw", "password", &Plain).hidden(),
        Spec::new("ldapi", "socket", &Plain),
    ];

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::text(*v)))
            .collect()
    }

    #[test]
    fn test_plan_orders_and_filters() {
        let desired = values(&[
            ("state", "present"),
            ("port", "389"),
            ("started", "false"),
            ("rootpw", "secret"),
        ]);
        let observed = values(&[("state", "absent")]);
        let actions = plan(
            OPTIONS,
            |n| desired.get(n).cloned(),
            |n| observed.get(n).cloned(),
        );
        let names: Vec<&str> = actions.iter().map(OptionAction::name).collect();
        assert_eq!(names, vec!["state", "rootpw", "started"]);
    }

    #[test]
    fn test_unset_desired_has_no_opinion() {
        let desired = values(&[]);
        let observed = values(&[("port", "3389")]);
        let actions = plan(
            OPTIONS,
            |n| desired.get(n).cloned(),
            |n| observed.get(n).cloned(),
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn test_describe_masks_hidden() {
        let action = OptionAction {
            option: &OPTIONS[3],
            from: None,
            to: Some(Value::text("secret")),
        };
        assert_eq!(action.describe(), "Set rootpw: None ==> ******");
    }
}
