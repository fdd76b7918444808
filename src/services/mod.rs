pub(crate) mod assembly;
pub(crate) mod attempt_policy;
pub(crate) mod evaluator;
