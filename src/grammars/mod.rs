mod compiled;
mod injections;
mod pattern_set;
mod raw;
mod regex;

pub use compiled::{
    BeginEndRule, BeginWhileRule, CompileError, CompiledGrammar, END_RULE_ID, GlobalRuleRef,
    GrammarId, IncludeOnlyRule, MatchRule, RegexId, Repository, RepositoryId, RepositoryStack,
    ROOT_RULE_ID, Rule, RuleId, RuleIdOrReference,
};
pub use injections::{CompiledInjectionMatcher, InjectionPrecedence, parse_injection_selector};
pub use pattern_set::{PatternSet, PatternSetMatch, TokenizeError};
pub use raw::{RawGrammar, Reference};
pub use regex::{Regex, resolve_backreferences};
