use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, Index};

use serde::{Deserialize, Serialize};

use crate::grammars::injections::{CompiledInjectionMatcher, parse_injection_selector};
use crate::grammars::raw::{Captures, RawGrammar, RawRule, Reference};
use crate::grammars::regex::Regex;
use crate::scope::Scope;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u16);

impl Deref for RuleId {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RuleId {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Sentinel for a grammar's top-level rule, always compiled first.
pub const ROOT_RULE_ID: RuleId = RuleId(0);
/// Sentinel used by [`crate::grammars::PatternSetMatch`] to signal an end/while match rather
/// than a regular pattern match.
pub const END_RULE_ID: RuleId = RuleId(u16::MAX);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegexId(pub u16);

impl Deref for RegexId {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RegexId {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub u16);

impl Deref for RepositoryId {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RepositoryId {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a grammar inside a [`crate::registry::Registry`]'s grammar arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrammarId(pub u16);

impl Deref for GrammarId {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl GrammarId {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// A rule id paired with the grammar it lives in, since patterns can reach across grammar
/// boundaries (`$base`, `source.other#rule`, injections).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GlobalRuleRef {
    pub grammar: GrammarId,
    pub rule: RuleId,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Repository(HashMap<String, RuleId>);

impl Repository {
    pub fn get(&self, name: &str) -> Option<&RuleId> {
        self.0.get(name)
    }
}

/// Stack of repository ids in lexical scope at the point a rule's `patterns` array was
/// compiled, innermost last. Used to resolve `#name` (`Reference::Local`) includes, which are
/// looked up innermost-to-outermost.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
pub struct RepositoryStack {
    stack: [Option<RepositoryId>; 8],
    len: u8,
}

impl RepositoryStack {
    pub fn push(mut self, id: RepositoryId) -> Self {
        self.stack[self.len as usize] = Some(id);
        self.len += 1;
        self
    }

    pub fn pop(mut self) -> (RepositoryId, Self) {
        let popped = self.stack[self.len as usize - 1].take().unwrap();
        self.len -= 1;
        (popped, self)
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Either a directly-compiled rule in this grammar, or an unresolved `include` reference that
/// a [`crate::registry::Registry`] resolves at link time.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum RuleIdOrReference {
    Rule(GlobalRuleRef),
    Reference(Reference),
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    pub name: Option<String>,
    /// `None` for scope-only rules, e.g. a capture that only assigns a name with no pattern of
    /// its own to match.
    pub regex_id: Option<RegexId>,
    pub captures: Vec<Option<GlobalRuleRef>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IncludeOnlyRule {
    pub name: Option<String>,
    pub content_name: Option<String>,
    pub patterns: Vec<RuleIdOrReference>,
    pub repository_stack: RepositoryStack,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BeginEndRule {
    pub name: Option<String>,
    pub content_name: Option<String>,
    pub begin: RegexId,
    pub begin_captures: Vec<Option<GlobalRuleRef>>,
    pub end: RegexId,
    pub end_has_backrefs: bool,
    pub end_captures: Vec<Option<GlobalRuleRef>>,
    pub apply_end_pattern_last: bool,
    pub patterns: Vec<RuleIdOrReference>,
    pub repository_stack: RepositoryStack,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BeginWhileRule {
    pub name: Option<String>,
    pub content_name: Option<String>,
    pub begin: RegexId,
    pub begin_captures: Vec<Option<GlobalRuleRef>>,
    pub while_: RegexId,
    pub while_has_backrefs: bool,
    pub while_captures: Vec<Option<GlobalRuleRef>>,
    pub apply_end_pattern_last: bool,
    pub patterns: Vec<RuleIdOrReference>,
    pub repository_stack: RepositoryStack,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    Match(MatchRule),
    IncludeOnly(IncludeOnlyRule),
    BeginEnd(BeginEndRule),
    BeginWhile(BeginWhileRule),
    Noop,
}

impl Rule {
    /// The rule's raw, un-interned `name`/`contentName`, mostly useful for debug logging.
    pub fn original_name(&self) -> &str {
        match self {
            Rule::Match(r) => r.name.as_deref().unwrap_or(""),
            Rule::IncludeOnly(r) => r.name.as_deref().unwrap_or(""),
            Rule::BeginEnd(r) => r.name.as_deref().unwrap_or(""),
            Rule::BeginWhile(r) => r.name.as_deref().unwrap_or(""),
            Rule::Noop => "",
        }
    }

    pub fn has_patterns(&self) -> bool {
        matches!(
            self,
            Rule::IncludeOnly(_) | Rule::BeginEnd(_) | Rule::BeginWhile(_)
        )
    }

    pub fn patterns(&self) -> &[RuleIdOrReference] {
        match self {
            Rule::IncludeOnly(r) => &r.patterns,
            Rule::BeginEnd(r) => &r.patterns,
            Rule::BeginWhile(r) => &r.patterns,
            Rule::Match(_) | Rule::Noop => &[],
        }
    }

    pub fn repository_stack(&self) -> RepositoryStack {
        match self {
            Rule::IncludeOnly(r) => r.repository_stack,
            Rule::BeginEnd(r) => r.repository_stack,
            Rule::BeginWhile(r) => r.repository_stack,
            Rule::Match(_) | Rule::Noop => RepositoryStack::default(),
        }
    }

    /// The scopes this rule's `name` resolves to for the given capture-group positions,
    /// resolving any `$n` placeholders against the matched line.
    pub fn get_name_scopes(&self, line: &str, captures: &[Option<(usize, usize)>]) -> Vec<Scope> {
        let name = match self {
            Rule::Match(r) => r.name.as_deref(),
            Rule::IncludeOnly(r) => r.name.as_deref(),
            Rule::BeginEnd(r) => r.name.as_deref(),
            Rule::BeginWhile(r) => r.name.as_deref(),
            Rule::Noop => None,
        };
        name.map(|n| Scope::new(&resolve_scope_name(n, line, captures)))
            .unwrap_or_default()
    }

    /// The scopes this rule's `contentName` resolves to (only begin/end, begin/while and
    /// include-only rules carry one).
    pub fn get_content_scopes(
        &self,
        line: &str,
        captures: &[Option<(usize, usize)>],
    ) -> Vec<Scope> {
        let name = match self {
            Rule::IncludeOnly(r) => r.content_name.as_deref(),
            Rule::BeginEnd(r) => r.content_name.as_deref(),
            Rule::BeginWhile(r) => r.content_name.as_deref(),
            Rule::Match(_) | Rule::Noop => None,
        };
        name.map(|n| Scope::new(&resolve_scope_name(n, line, captures)))
            .unwrap_or_default()
    }
}

/// Substitutes `$n` capture-group placeholders in a scope name, e.g. the HTML grammar's
/// `entity.other.attribute-name.$1.html`.
fn resolve_scope_name(name: &str, line: &str, captures: &[Option<(usize, usize)>]) -> String {
    if !name.contains('$') {
        return name.to_string();
    }

    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
            let group = chars[i + 1].to_digit(10).unwrap() as usize;
            if let Some(Some((start, end))) = captures.get(group) {
                result.push_str(&line[*start..*end]);
            }
            i += 2;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledGrammar {
    pub name: String,
    pub display_name: Option<String>,
    pub scope_name: String,
    pub scope: Scope,
    pub file_types: Vec<String>,
    pub first_line_match: Option<Regex>,
    pub regexes: Vec<Regex>,
    pub rules: Vec<Rule>,
    pub repositories: Vec<Repository>,
    /// Injection patterns defined by this grammar's own `injections` map, each paired with the
    /// selector that must match the current scope stack for it to apply.
    pub injections: Vec<(CompiledInjectionMatcher, RuleId)>,
    /// Parsed top-level `injectionSelector`, for grammars that exist only to inject into others
    /// (e.g. a markdown math extension).
    pub injection_selector: Vec<CompiledInjectionMatcher>,
    pub inject_to: Vec<String>,
}

impl CompiledGrammar {
    /// Runs this grammar's `firstLineMatch` pattern (if any) against just the first line of
    /// `text`, for content-sniffing when a caller has no file extension to go on.
    pub fn matches_first_line(&self, text: &str) -> bool {
        let Some(pattern) = &self.first_line_match else {
            return false;
        };
        let first_line_end = text.find(['\n', '\r']).unwrap_or(text.len());
        pattern.find_at(&text[..first_line_end], 0).is_some()
    }

    pub fn compile(raw: RawGrammar, grammar_id: GrammarId) -> Result<Self, CompileError> {
        let scope = Scope::new(&raw.scope_name)
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut grammar = Self {
            name: raw.name,
            display_name: raw.display_name,
            scope_name: raw.scope_name,
            scope,
            file_types: raw.file_types,
            first_line_match: raw.first_line_match.map(Regex::new),
            regexes: Vec::new(),
            rules: Vec::new(),
            repositories: Vec::new(),
            injections: Vec::new(),
            injection_selector: raw
                .injection_selector
                .as_deref()
                .map(parse_injection_selector)
                .unwrap_or_default(),
            inject_to: raw.inject_to,
        };

        let root_rule = RawRule {
            patterns: raw.patterns,
            repository: raw.repository,
            ..Default::default()
        };
        let root_rule_id =
            grammar.compile_rule(root_rule, RepositoryStack::default(), grammar_id)?;
        assert_eq!(root_rule_id, ROOT_RULE_ID);

        for (selector, raw_rule) in raw.injections {
            let rule_id = grammar.compile_rule(raw_rule, RepositoryStack::default(), grammar_id)?;
            for matcher in parse_injection_selector(&selector) {
                grammar.injections.push((matcher, rule_id));
            }
        }

        Ok(grammar)
    }

    fn compile_rule(
        &mut self,
        raw_rule: RawRule,
        repository_stack: RepositoryStack,
        grammar_id: GrammarId,
    ) -> Result<RuleId, CompileError> {
        let id = RuleId(self.rules.len() as u16);
        self.rules.push(Rule::Noop);

        let name = raw_rule.name;
        let content_name = raw_rule.content_name;

        // https://github.com/microsoft/vscode-textmate/blob/f03a6a8790af81372d0e81facae75554ec5e97ef/src/rule.ts#L389-L447
        let rule = if let Some(pat) = raw_rule.match_ {
            let regex_id = self.compile_regex_validated(pat)?;
            let captures = self.compile_captures(raw_rule.captures, repository_stack, grammar_id)?;
            Rule::Match(MatchRule {
                name,
                regex_id: Some(regex_id),
                captures,
            })
        } else if let Some(begin_pat) = raw_rule.begin {
            let apply_end_pattern_last = raw_rule.apply_end_pattern_last;
            let begin = self.compile_regex_validated(begin_pat)?;
            let begin_captures =
                self.compile_captures(raw_rule.begin_captures, repository_stack, grammar_id)?;

            if let Some(while_pat) = raw_rule.while_ {
                let (while_, while_has_backrefs) = self.compile_regex(while_pat);
                let while_captures =
                    self.compile_captures(raw_rule.while_captures, repository_stack, grammar_id)?;
                let patterns = self.compile_patterns(raw_rule.patterns, repository_stack, grammar_id)?;
                Rule::BeginWhile(BeginWhileRule {
                    name,
                    content_name,
                    begin,
                    begin_captures,
                    while_,
                    while_has_backrefs,
                    while_captures,
                    apply_end_pattern_last,
                    patterns,
                    repository_stack,
                })
            } else if let Some(end_pat) = raw_rule.end {
                let (end, end_has_backrefs) = self.compile_regex(end_pat);
                let end_captures =
                    self.compile_captures(raw_rule.end_captures, repository_stack, grammar_id)?;
                let patterns = self.compile_patterns(raw_rule.patterns, repository_stack, grammar_id)?;
                Rule::BeginEnd(BeginEndRule {
                    name,
                    content_name,
                    begin,
                    begin_captures,
                    end,
                    end_has_backrefs,
                    end_captures,
                    apply_end_pattern_last,
                    patterns,
                    repository_stack,
                })
            } else {
                // a rule that has begin without while/end is just a match, probably a typo
                Rule::Match(MatchRule {
                    name,
                    regex_id: Some(begin),
                    captures: begin_captures,
                })
            }
        } else {
            let repository_stack = if raw_rule.repository.is_empty() {
                repository_stack
            } else {
                let repo_id =
                    self.compile_repository(raw_rule.repository, repository_stack, grammar_id)?;
                repository_stack.push(repo_id)
            };

            if name.is_some() && raw_rule.patterns.is_empty() && raw_rule.include.is_none() {
                // A scope-only rule, e.g. a capture that only assigns a name.
                Rule::Match(MatchRule {
                    name,
                    regex_id: None,
                    captures: Vec::new(),
                })
            } else {
                // vscode-textmate does something funny here:
                // - if patterns are NOT present and includes are, it moves includes to patterns;
                // - however, if patterns ARE present, includes are ignored
                // https://github.com/microsoft/vscode-textmate/blob/f03a6a8790af81372d0e81facae75554ec5e97ef/src/rule.ts#L404
                let patterns = if raw_rule.patterns.is_empty() {
                    match raw_rule.include {
                        Some(include) => vec![RawRule {
                            include: Some(include),
                            ..Default::default()
                        }],
                        None => Vec::new(),
                    }
                } else {
                    raw_rule.patterns
                };

                if patterns.is_empty() {
                    Rule::Noop
                } else {
                    let compiled_patterns =
                        self.compile_patterns(patterns, repository_stack, grammar_id)?;
                    Rule::IncludeOnly(IncludeOnlyRule {
                        name,
                        content_name,
                        patterns: compiled_patterns,
                        repository_stack,
                    })
                }
            }
        };

        self.rules[id.as_index()] = rule;
        Ok(id)
    }

    fn compile_regex(&mut self, pattern: String) -> (RegexId, bool) {
        let regex_id = RegexId(self.regexes.len() as u16);
        let re = Regex::new(pattern);
        let has_backrefs = re.has_backreferences();
        self.regexes.push(re);

        (regex_id, has_backrefs)
    }

    /// Compiles a pattern that's expected to be self-contained (`match`/`begin`), eagerly
    /// validating it since, unlike `end`/`while`, it can never rely on backreferences to
    /// groups outside its own pattern.
    fn compile_regex_validated(&mut self, pattern: String) -> Result<RegexId, CompileError> {
        if let Err(error) = onig::Regex::new(&pattern) {
            return Err(CompileError::InvalidRegex { pattern, error });
        }
        Ok(self.compile_regex(pattern).0)
    }

    fn compile_repository(
        &mut self,
        raw_repository: BTreeMap<String, RawRule>,
        repository_stack: RepositoryStack,
        grammar_id: GrammarId,
    ) -> Result<RepositoryId, CompileError> {
        let repo_id = RepositoryId(self.repositories.len() as u16);
        self.repositories.push(Repository::default());
        let stack = repository_stack.push(repo_id);

        let mut rules = HashMap::new();
        for (name, raw_rule) in raw_repository {
            rules.insert(name, self.compile_rule(raw_rule, stack, grammar_id)?);
        }
        self.repositories[repo_id.as_index()] = Repository(rules);

        Ok(repo_id)
    }

    fn compile_captures(
        &mut self,
        captures: Captures,
        repository_stack: RepositoryStack,
        grammar_id: GrammarId,
    ) -> Result<Vec<Option<GlobalRuleRef>>, CompileError> {
        if captures.is_empty() {
            return Ok(Vec::new());
        }

        // mdc.json syntax has actually a 912 backref
        let max_capture = captures.keys().max().copied().unwrap_or_default();
        let mut out: Vec<Option<GlobalRuleRef>> = vec![None; max_capture + 1];

        for (key, rule) in captures.0 {
            let rule_id = self.compile_rule(rule, repository_stack, grammar_id)?;
            out[key] = Some(GlobalRuleRef {
                grammar: grammar_id,
                rule: rule_id,
            });
        }

        Ok(out)
    }

    fn compile_patterns(
        &mut self,
        rules: Vec<RawRule>,
        repository_stack: RepositoryStack,
        grammar_id: GrammarId,
    ) -> Result<Vec<RuleIdOrReference>, CompileError> {
        let mut out = Vec::with_capacity(rules.len());

        for r in rules {
            if let Some(include) = r.include {
                // vscode ignores other rule contents if there's an include
                // https://github.com/microsoft/vscode-textmate/blob/f03a6a8790af81372d0e81facae75554ec5e97ef/src/rule.ts#L495
                out.push(RuleIdOrReference::Reference(include));
            } else {
                let rule_id = self.compile_rule(r, repository_stack, grammar_id)?;
                out.push(RuleIdOrReference::Rule(GlobalRuleRef {
                    grammar: grammar_id,
                    rule: rule_id,
                }));
            }
        }

        Ok(out)
    }

    pub fn get_original_rule_name(&self, rule_id: RuleId) -> &str {
        self.rules
            .get(rule_id.as_index())
            .map(|r| r.original_name())
            .unwrap_or("")
    }

    /// Resolves a `#name` include by searching the repository stack innermost-to-outermost.
    pub fn resolve_local(&self, mut stack: RepositoryStack, name: &str) -> Option<RuleId> {
        loop {
            if stack.is_empty() {
                return None;
            }
            let (repo_id, rest) = stack.pop();
            if let Some(rule_id) = self
                .repositories
                .get(repo_id.as_index())
                .and_then(|repo| repo.get(name))
            {
                return Some(*rule_id);
            }
            stack = rest;
        }
    }
}

impl Index<RuleId> for Vec<Rule> {
    type Output = Rule;

    fn index(&self, id: RuleId) -> &Rule {
        &self[id.as_index()]
    }
}

impl Index<RegexId> for Vec<Regex> {
    type Output = Regex;

    fn index(&self, id: RegexId) -> &Regex {
        &self[id.as_index()]
    }
}

impl Index<GrammarId> for Vec<CompiledGrammar> {
    type Output = CompiledGrammar;

    fn index(&self, id: GrammarId) -> &CompiledGrammar {
        &self[id.as_index()]
    }
}

impl RawGrammar {
    /// Compiles this grammar standalone, as grammar 0 of its own registry. Multi-grammar
    /// registries instead call [`CompiledGrammar::compile`] directly with the real
    /// [`GrammarId`] assigned at registration time.
    pub fn compile(self) -> Result<CompiledGrammar, CompileError> {
        CompiledGrammar::compile(self, GrammarId(0))
    }
}

/// Errors that can occur during grammar compilation
#[derive(Debug)]
pub enum CompileError {
    InvalidRegex { pattern: String, error: onig::Error },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::InvalidRegex { pattern, error } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, error)
            }
        }
    }
}

impl std::error::Error for CompileError {}
