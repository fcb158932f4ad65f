use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, HighlightResult};
use crate::grammars::{
    CompiledGrammar, GlobalRuleRef, GrammarId, InjectionPrecedence, RawGrammar, ROOT_RULE_ID,
    Reference, Rule, RuleIdOrReference,
};
use crate::highlight::{HighlightedText, Highlighter, MergingOptions};
use crate::scope::Scope;
use crate::themes::{CompiledTheme, RawTheme, ThemeVariant, generate_css as generate_theme_css};
use crate::tokenizer::Tokenizer;

/// Name under which the built-in, rule-less fallback grammar is always registered.
///
/// A freshly constructed [`Registry`] can always highlight against this grammar: every byte of
/// input comes back as a single unscoped token.
pub const PLAIN_GRAMMAR_NAME: &str = "plain";

/// What to highlight, and with which theme(s).
#[derive(Debug, Clone)]
pub struct HighlightOptions {
    /// Grammar name to highlight with, matched case-insensitively against a grammar's `name` or
    /// any alias registered for it.
    pub lang: String,
    /// Theme(s) to resolve styles against.
    pub theme: ThemeVariant<String>,
    /// Token-merging behaviour applied to the result.
    pub merging: MergingOptions,
}

impl HighlightOptions {
    /// Creates highlight options for a single or dual theme.
    pub fn new(lang: impl Into<String>, theme: ThemeVariant<&str>) -> Self {
        Self {
            lang: lang.into(),
            theme: theme.map(|s| s.to_string()),
            merging: MergingOptions::default(),
        }
    }
}

/// The result of highlighting a piece of code: one `Vec<HighlightedText>` per line.
#[derive(Debug, Clone)]
pub struct HighlightedCode<'r> {
    /// Highlighted tokens, one inner vec per line of the input.
    pub tokens: Vec<Vec<HighlightedText>>,
    /// The theme(s) the tokens were styled against.
    pub theme: ThemeVariant<&'r CompiledTheme>,
}

/// A collection of compiled grammars and themes, and the entry point for highlighting code.
///
/// Grammars live in an arena indexed by [`GrammarId`] so that cross-grammar includes
/// (`$base`, `scope.name#key`, injections) can be resolved by index rather than by name lookup at
/// tokenize time. [`Registry::link_grammars`] must be called once after all grammars have been
/// added and before [`Registry::highlight`] is used, so that `include` references can be resolved
/// against the final set of loaded grammars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub(crate) grammars: Vec<CompiledGrammar>,
    grammar_by_name: HashMap<String, GrammarId>,
    grammar_by_scope: HashMap<String, GrammarId>,
    file_types: HashMap<String, GrammarId>,
    themes: HashMap<String, CompiledTheme>,
    linked: bool,
}

impl Default for Registry {
    fn default() -> Self {
        let plain = RawGrammar {
            name: PLAIN_GRAMMAR_NAME.to_string(),
            scope_name: "text.plain".to_string(),
            ..Default::default()
        };
        // Infallible: the plain grammar has no patterns to compile.
        let plain = CompiledGrammar::compile(plain, GrammarId(0))
            .expect("the built-in plain grammar always compiles");

        let mut grammar_by_name = HashMap::new();
        let mut grammar_by_scope = HashMap::new();
        grammar_by_name.insert(PLAIN_GRAMMAR_NAME.to_string(), GrammarId(0));
        grammar_by_scope.insert(plain.scope_name.clone(), GrammarId(0));

        Self {
            grammars: vec![plain],
            grammar_by_name,
            grammar_by_scope,
            file_types: HashMap::new(),
            themes: HashMap::new(),
            linked: false,
        }
    }
}

impl Registry {
    /// Adds a grammar from its raw TextMate JSON source.
    pub fn add_grammar_from_str(&mut self, grammar: &str) -> HighlightResult<()> {
        let raw: RawGrammar = serde_json::from_str(grammar)?;
        self.add_raw_grammar(raw)
    }

    /// Adds a grammar from a TextMate JSON file on disk.
    pub fn add_grammar_from_path(&mut self, path: impl AsRef<Path>) -> HighlightResult<()> {
        let content = fs::read_to_string(path)?;
        self.add_grammar_from_str(&content)
    }

    fn add_raw_grammar(&mut self, raw: RawGrammar) -> HighlightResult<()> {
        let key = raw.name.to_lowercase();
        if self.linked && self.grammar_by_name.contains_key(&key) {
            return Err(Error::ReplacingGrammarPostLinking(raw.name));
        }

        for file_type in &raw.file_types {
            if let Some(existing) = self.file_types.get(file_type)
                && self.grammars[existing.as_index()].name.to_lowercase() != key
            {
                return Err(Error::ConflictingFileType(file_type.clone()));
            }
        }

        let grammar_id = GrammarId(self.grammars.len() as u16);
        let scope_name = raw.scope_name.clone();
        let file_types = raw.file_types.clone();
        let compiled =
            CompiledGrammar::compile(raw, grammar_id).map_err(|e| Error::TokenizeRegex(e.to_string()))?;

        self.grammar_by_name.insert(key, grammar_id);
        self.grammar_by_scope.insert(scope_name, grammar_id);
        for file_type in file_types {
            self.file_types.insert(file_type, grammar_id);
        }
        self.grammars.push(compiled);
        self.linked = false;

        Ok(())
    }

    /// Registers an additional name under which an already-loaded grammar can be found.
    pub fn add_alias(&mut self, grammar_name: &str, alias: &str) -> HighlightResult<()> {
        let id = self
            .grammar_by_name
            .get(&grammar_name.to_lowercase())
            .copied()
            .ok_or_else(|| Error::GrammarNotFound(grammar_name.to_string()))?;
        self.grammar_by_name.insert(alias.to_lowercase(), id);
        Ok(())
    }

    /// Maps additional file extensions to the built-in [`PLAIN_GRAMMAR_NAME`] grammar.
    pub fn add_plain_grammar(&mut self, file_types: &[&str]) -> HighlightResult<()> {
        let id = self.grammar_by_name[PLAIN_GRAMMAR_NAME];
        for file_type in file_types {
            if let Some(existing) = self.file_types.get(*file_type)
                && *existing != id
            {
                return Err(Error::ConflictingFileType((*file_type).to_string()));
            }
            self.file_types.insert((*file_type).to_string(), id);
        }
        Ok(())
    }

    /// Adds a theme from its raw VSCode-style theme JSON source, registered under `name`.
    pub fn add_theme_from_str(&mut self, name: &str, content: &str) -> HighlightResult<()> {
        let raw: RawTheme = serde_json::from_str(content)?;
        let compiled = raw.compile().map_err(|e| Error::InvalidHexColor {
            value: name.to_string(),
            reason: e.to_string(),
        })?;
        self.themes.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Adds a theme from a JSON file on disk, registered under the file's stem (e.g.
    /// `vitesse-black.json` is registered as `vitesse-black`).
    pub fn add_theme_from_path(&mut self, path: impl AsRef<Path>) -> HighlightResult<()> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let content = fs::read_to_string(path)?;
        self.add_theme_from_str(&name, &content)
    }

    /// Resolves every `include` reference across all loaded grammars.
    ///
    /// Must be called after all grammars have been added and before [`Registry::highlight`].
    /// Safe to call again after adding more grammars; already-resolved references are simply
    /// re-resolved to the same target.
    pub fn link_grammars(&mut self) {
        let scope_index: HashMap<String, GrammarId> = self
            .grammars
            .iter()
            .enumerate()
            .map(|(i, g)| (g.scope_name.clone(), GrammarId(i as u16)))
            .collect();

        for i in 0..self.grammars.len() {
            let grammar_id = GrammarId(i as u16);
            let rule_count = self.grammars[i].rules.len();
            for rule_idx in 0..rule_count {
                self.resolve_rule_references(grammar_id, rule_idx, &scope_index);
            }
        }

        self.linked = true;
    }

    /// Resolves the `include` references carried directly by one rule's pattern list.
    fn resolve_rule_references(
        &mut self,
        grammar_id: GrammarId,
        rule_idx: usize,
        scope_index: &HashMap<String, GrammarId>,
    ) {
        let current = self.grammars[grammar_id.as_index()].rules[rule_idx]
            .patterns()
            .to_vec();
        if current.is_empty() {
            return;
        }

        let rule_repo_stack = self.grammars[grammar_id.as_index()].rules[rule_idx].repository_stack();

        let resolved: Vec<RuleIdOrReference> = current
            .into_iter()
            .map(|entry| match entry {
                RuleIdOrReference::Rule(r) => RuleIdOrReference::Rule(r),
                RuleIdOrReference::Reference(reference) => self.resolve_reference(
                    grammar_id,
                    rule_repo_stack,
                    &reference,
                    scope_index,
                ),
            })
            .collect();

        match &mut self.grammars[grammar_id.as_index()].rules[rule_idx] {
            Rule::IncludeOnly(r) => r.patterns = resolved,
            Rule::BeginEnd(r) => r.patterns = resolved,
            Rule::BeginWhile(r) => r.patterns = resolved,
            Rule::Match(_) | Rule::Noop => {}
        }
    }

    /// Resolves a single `include` value into a concrete rule reference, leaving `$base`
    /// unresolved (it can only be determined once tokenization knows which grammar the caller
    /// actually requested) and unresolvable references (missing grammar or repository entry)
    /// unresolved, matching vscode-textmate's silent-no-op behaviour for broken includes.
    fn resolve_reference(
        &self,
        grammar_id: GrammarId,
        repo_stack: crate::grammars::RepositoryStack,
        reference: &Reference,
        scope_index: &HashMap<String, GrammarId>,
    ) -> RuleIdOrReference {
        let unresolved = || RuleIdOrReference::Reference(reference.clone());

        match reference {
            Reference::Base => unresolved(),
            Reference::Self_ => RuleIdOrReference::Rule(GlobalRuleRef {
                grammar: grammar_id,
                rule: ROOT_RULE_ID,
            }),
            Reference::Local(name) => {
                match self.grammars[grammar_id.as_index()].resolve_local(repo_stack, name) {
                    Some(rule) => RuleIdOrReference::Rule(GlobalRuleRef {
                        grammar: grammar_id,
                        rule,
                    }),
                    None => unresolved(),
                }
            }
            Reference::OtherComplete(scope) => match scope_index.get(scope) {
                Some(&other) => RuleIdOrReference::Rule(GlobalRuleRef {
                    grammar: other,
                    rule: ROOT_RULE_ID,
                }),
                None => unresolved(),
            },
            Reference::OtherSpecific(scope, name) => match scope_index.get(scope) {
                Some(&other) => {
                    let root_stack =
                        self.grammars[other.as_index()].rules[ROOT_RULE_ID.as_index()].repository_stack();
                    match self.grammars[other.as_index()].resolve_local(root_stack, name) {
                        Some(rule) => RuleIdOrReference::Rule(GlobalRuleRef {
                            grammar: other,
                            rule,
                        }),
                        None => unresolved(),
                    }
                }
                None => unresolved(),
            },
        }
    }

    /// Flattens a rule's pattern list into leaf match/begin patterns, recursively inlining
    /// `IncludeOnly` rules and resolving `$base` against `base_grammar_id`.
    ///
    /// Mirrors vscode-textmate's recursive scanner construction: an include that resolves to
    /// another include-only rule is expanded in place rather than becoming its own scanner entry.
    pub(crate) fn collect_patterns(
        &self,
        base_grammar_id: GrammarId,
        rule_ref: GlobalRuleRef,
    ) -> Vec<(GlobalRuleRef, &str)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_patterns_into(base_grammar_id, rule_ref, &mut out, &mut seen);
        out
    }

    fn collect_patterns_into<'s>(
        &'s self,
        base_grammar_id: GrammarId,
        rule_ref: GlobalRuleRef,
        out: &mut Vec<(GlobalRuleRef, &'s str)>,
        seen: &mut HashSet<GlobalRuleRef>,
    ) {
        if !seen.insert(rule_ref) {
            return;
        }
        let Some(grammar) = self.grammars.get(rule_ref.grammar.as_index()) else {
            return;
        };
        let Some(rule) = grammar.rules.get(rule_ref.rule.as_index()) else {
            return;
        };

        for entry in rule.patterns() {
            match entry {
                RuleIdOrReference::Rule(r) => self.expand_leaf(base_grammar_id, *r, out, seen),
                RuleIdOrReference::Reference(Reference::Base) => {
                    let target = GlobalRuleRef {
                        grammar: base_grammar_id,
                        rule: ROOT_RULE_ID,
                    };
                    self.expand_leaf(base_grammar_id, target, out, seen);
                }
                RuleIdOrReference::Reference(_) => {}
            }
        }
    }

    fn expand_leaf<'s>(
        &'s self,
        base_grammar_id: GrammarId,
        rule_ref: GlobalRuleRef,
        out: &mut Vec<(GlobalRuleRef, &'s str)>,
        seen: &mut HashSet<GlobalRuleRef>,
    ) {
        let Some(grammar) = self.grammars.get(rule_ref.grammar.as_index()) else {
            return;
        };
        let Some(rule) = grammar.rules.get(rule_ref.rule.as_index()) else {
            return;
        };

        match rule {
            Rule::Match(m) => {
                if let Some(regex_id) = m.regex_id {
                    out.push((rule_ref, grammar.regexes[regex_id].pattern()));
                }
            }
            Rule::BeginEnd(b) => out.push((rule_ref, grammar.regexes[b.begin].pattern())),
            Rule::BeginWhile(b) => out.push((rule_ref, grammar.regexes[b.begin].pattern())),
            Rule::IncludeOnly(_) => self.collect_patterns_into(base_grammar_id, rule_ref, out, seen),
            Rule::Noop => {}
        }
    }

    /// Collects injection patterns active for the given scope stack: the base grammar's own
    /// `injections` map, plus any other loaded grammar's top-level `injectionSelector` that
    /// lists `base_grammar_id`'s scope in its `injectTo`.
    pub(crate) fn collect_injection_patterns(
        &self,
        base_grammar_id: GrammarId,
        scope_stack: &[Scope],
    ) -> Vec<(InjectionPrecedence, GlobalRuleRef)> {
        let mut out = Vec::new();
        let Some(base) = self.grammars.get(base_grammar_id.as_index()) else {
            return out;
        };

        for (matcher, rule_id) in &base.injections {
            if matcher.matches(scope_stack) {
                out.push((
                    matcher.priority().unwrap_or(InjectionPrecedence::Right),
                    GlobalRuleRef {
                        grammar: base_grammar_id,
                        rule: *rule_id,
                    },
                ));
            }
        }

        for (idx, grammar) in self.grammars.iter().enumerate() {
            let grammar_id = GrammarId(idx as u16);
            if grammar_id == base_grammar_id || !grammar.inject_to.iter().any(|s| *s == base.scope_name) {
                continue;
            }
            for matcher in &grammar.injection_selector {
                if matcher.matches(scope_stack) {
                    out.push((
                        matcher.priority().unwrap_or(InjectionPrecedence::Right),
                        GlobalRuleRef {
                            grammar: grammar_id,
                            rule: ROOT_RULE_ID,
                        },
                    ));
                }
            }
        }

        out
    }

    pub(crate) fn grammar_id(&self, lang: &str) -> HighlightResult<GrammarId> {
        self.grammar_by_name
            .get(&lang.to_lowercase())
            .copied()
            .ok_or_else(|| Error::GrammarNotFound(lang.to_string()))
    }

    /// Looks up the grammar registered for a file extension (without the leading dot, e.g.
    /// `"rs"`), as declared by that grammar's `fileTypes`.
    pub fn lang_for_file_type(&self, file_type: &str) -> Option<&str> {
        let id = self.file_types.get(file_type)?;
        Some(&self.grammars[id.as_index()].name)
    }

    /// Finds a grammar whose `firstLineMatch` pattern matches the first line of `text`, for
    /// documents with no extension or an unrecognised one. Grammars are probed in registration
    /// order; the first match wins.
    pub fn lang_for_first_line(&self, text: &str) -> Option<&str> {
        self.grammars
            .iter()
            .find(|g| g.matches_first_line(text))
            .map(|g| g.name.as_str())
    }

    fn theme(&self, name: &str) -> HighlightResult<&CompiledTheme> {
        self.themes
            .get(name)
            .ok_or_else(|| Error::ThemeNotFound(name.to_string()))
    }

    /// Tokenizes and styles `code` with the grammar and theme(s) named in `options`.
    pub fn highlight(&self, code: &str, options: &HighlightOptions) -> HighlightResult<HighlightedCode<'_>> {
        if !self.linked {
            return Err(Error::UnlinkedGrammars);
        }

        let grammar_id = self.grammar_id(&options.lang)?;
        let mut tokenizer = Tokenizer::new(grammar_id, self);
        let lines = tokenizer.tokenize_string(code).map_err(Error::TokenizeRegex)?;

        let theme = match &options.theme {
            ThemeVariant::Single(name) => ThemeVariant::Single(self.theme(name)?),
            ThemeVariant::Dual { light, dark } => ThemeVariant::Dual {
                light: self.theme(light)?,
                dark: self.theme(dark)?,
            },
        };

        let mut highlighter = match theme {
            ThemeVariant::Single(t) => Highlighter::new(t),
            ThemeVariant::Dual { light, dark } => Highlighter::new_dual(light, dark),
        };

        let tokens = highlighter.highlight_tokens(code, lines, options.merging);

        Ok(HighlightedCode { tokens, theme })
    }

    /// Generates a standalone CSS stylesheet for `theme_name`, prefixing every class with
    /// `prefix`, for use with [`crate::RenderOptions`]'s CSS-class output mode.
    pub fn generate_css(&self, theme_name: &str, prefix: &str) -> HighlightResult<String> {
        generate_theme_css(self.theme(theme_name)?, prefix)
    }

    #[cfg(feature = "dump")]
    /// Serializes the registry (grammars, themes, and the global scope-interning table) to a
    /// bitcode + zstd blob, for loading later without re-parsing every grammar/theme JSON file.
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> HighlightResult<()> {
        let dump = RegistryDump {
            registry: self.clone(),
            scope_repo: crate::scope::lock_global_scope_repo().clone(),
        };
        let bytes = bitcode::serialize(&dump)?;
        let compressed = zstd::encode_all(bytes.as_slice(), 0).map_err(Error::Io)?;
        fs::write(path, compressed)?;
        Ok(())
    }

    #[cfg(feature = "dump")]
    /// Loads a registry previously written by [`Registry::dump_to_file`].
    pub fn load_from_file(path: impl AsRef<Path>) -> HighlightResult<Self> {
        let compressed = fs::read(path)?;
        let bytes = zstd::decode_all(compressed.as_slice()).map_err(Error::Io)?;
        let dump: RegistryDump = bitcode::deserialize(&bytes)?;
        crate::scope::replace_global_scope_repo(dump.scope_repo);
        Ok(dump.registry)
    }
}

#[cfg(feature = "dump")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RegistryDump {
    registry: Registry,
    scope_repo: crate::scope::ScopeRepository,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThemeVariant as TV;

    const RUST_GRAMMAR: &str = r#"{
        "name": "rust",
        "scopeName": "source.rust",
        "patterns": [
            { "match": "\\bfn\\b", "name": "keyword.fn" }
        ]
    }"#;

    #[test]
    fn unlinked_registry_refuses_to_highlight() {
        let mut registry = Registry::default();
        registry.add_grammar_from_str(RUST_GRAMMAR).unwrap();
        let options = HighlightOptions::new("rust", TV::Single("none"));
        let err = registry.highlight("fn main() {}", &options).unwrap_err();
        assert!(matches!(err, Error::UnlinkedGrammars));
    }

    #[test]
    fn unknown_grammar_errors() {
        let mut registry = Registry::default();
        registry.link_grammars();
        let options = HighlightOptions::new("nope", TV::Single("none"));
        let err = registry.highlight("x", &options).unwrap_err();
        assert!(matches!(err, Error::GrammarNotFound(name) if name == "nope"));
    }

    #[test]
    fn plain_grammar_is_always_registered() {
        let registry = Registry::default();
        assert!(registry.grammar_by_name.contains_key(PLAIN_GRAMMAR_NAME));
    }

    #[test]
    fn conflicting_file_types_are_rejected() {
        let mut registry = Registry::default();
        let other = r#"{"name": "other", "scopeName": "source.other", "fileTypes": ["rs"]}"#;
        registry.add_grammar_from_str(other).unwrap();
        let conflicting = r#"{"name": "third", "scopeName": "source.third", "fileTypes": ["rs"]}"#;
        let err = registry.add_grammar_from_str(conflicting).unwrap_err();
        assert!(matches!(err, Error::ConflictingFileType(ft) if ft == "rs"));
    }

    #[test]
    fn alias_resolves_to_same_grammar() {
        let mut registry = Registry::default();
        registry.add_grammar_from_str(RUST_GRAMMAR).unwrap();
        registry.add_alias("rust", "rs-lang").unwrap();
        assert_eq!(
            registry.grammar_id("rs-lang").unwrap(),
            registry.grammar_id("rust").unwrap()
        );
    }

    #[test]
    fn replacing_grammar_after_linking_errors() {
        let mut registry = Registry::default();
        registry.add_grammar_from_str(RUST_GRAMMAR).unwrap();
        registry.link_grammars();
        let err = registry.add_grammar_from_str(RUST_GRAMMAR).unwrap_err();
        assert!(matches!(err, Error::ReplacingGrammarPostLinking(_)));
    }

    #[test]
    fn lang_for_file_type_resolves_registered_extension() {
        let mut registry = Registry::default();
        let grammar = r#"{"name": "rust", "scopeName": "source.rust", "fileTypes": ["rs"]}"#;
        registry.add_grammar_from_str(grammar).unwrap();
        assert_eq!(registry.lang_for_file_type("rs"), Some("rust"));
        assert_eq!(registry.lang_for_file_type("py"), None);
    }

    #[test]
    fn lang_for_first_line_sniffs_shebang() {
        let mut registry = Registry::default();
        let grammar = r#"{
            "name": "node",
            "scopeName": "source.node",
            "firstLineMatch": "^#!.*\\bnode\\b"
        }"#;
        registry.add_grammar_from_str(grammar).unwrap();
        assert_eq!(
            registry.lang_for_first_line("#!/usr/bin/env node\nconsole.log(1)"),
            Some("node")
        );
        assert_eq!(registry.lang_for_first_line("plain text\nmore"), None);
    }
}
