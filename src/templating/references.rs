//! `.Values` reference collection over parsed templates.
//!
//! The collector tracks what `.` and each `$variable` point at while walking
//! the syntax tree:
//!
//! - at the top level and inside `define`, `.` is the chart root, so
//!   `.Values.a.b` is the values path `a.b`
//! - `$` is always the root, so `$.Values.a.b` is `a.b` anywhere
//! - `with .Values.a` rebinds `.` to `a` in its body, making `.b` mean `a.b`
//! - `$x := .Values.a` binds `$x`, making `$x.b` mean `a.b`
//! - `index .Values.a "b" 0` is `a.b[0]` as long as the keys are literals
//! - inside `range`, `.` is an element of unknown position and is not followed

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::parser::{Command, Node, Operand, ParseError, Pipeline, parse};
use crate::constants::VALUES_ROOT;
use crate::utils::FieldPath;

/// A template the analyzer could not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTemplate {
    /// Template name
    pub name: String,
    /// Parser message
    pub reason: String,
}

/// Result of analyzing a set of templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceAnalysis {
    /// Referenced values paths, in canonical field-path form
    pub paths: BTreeSet<String>,
    /// Templates that failed to parse and were left out
    pub skipped: Vec<SkippedTemplate>,
}

/// What an expression evaluates to, as far as the analysis can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    /// The chart root (`.` at top level, `$`)
    Root,
    /// A node of the values tree
    Values(FieldPath),
    /// Anything else
    Unknown,
}

impl Scope {
    fn field(self, name: &str) -> Self {
        match self {
            Self::Root if name == VALUES_ROOT => Self::Values(FieldPath::root()),
            Self::Values(mut path) => {
                path.push_key(name);
                Self::Values(path)
            }
            _ => Self::Unknown,
        }
    }

    fn index(self, position: usize) -> Self {
        match self {
            Self::Values(mut path) => {
                path.push_index(position);
                Self::Values(path)
            }
            _ => Self::Unknown,
        }
    }

    fn fields(self, names: &[String]) -> Self {
        names.iter().fold(self, |scope, name| scope.field(name))
    }
}

#[derive(Default)]
struct Collector {
    paths: BTreeSet<String>,
    vars: HashMap<String, Scope>,
}

impl Collector {
    fn record(&mut self, scope: &Scope) {
        if let Scope::Values(path) = scope
            && !path.is_empty()
        {
            self.paths.insert(path.to_string());
        }
    }

    fn nodes(&mut self, nodes: &[Node], dot: &Scope) {
        for node in nodes {
            self.node(node, dot);
        }
    }

    fn node(&mut self, node: &Node, dot: &Scope) {
        match node {
            Node::Text(_) | Node::Comment | Node::Break | Node::Continue => {}
            Node::Action(pipeline) => {
                self.pipeline(pipeline, dot);
            }
            Node::If(branch) => {
                self.pipeline(&branch.pipeline, dot);
                self.nodes(&branch.body, dot);
                self.else_nodes(branch.else_body.as_deref(), dot);
            }
            Node::With(branch) => {
                let inner = self.pipeline(&branch.pipeline, dot);
                self.nodes(&branch.body, &inner);
                self.else_nodes(branch.else_body.as_deref(), dot);
            }
            Node::Range(branch) => {
                self.pipeline(&branch.pipeline, dot);
                for name in &branch.pipeline.decl {
                    self.vars.insert(name.clone(), Scope::Unknown);
                }
                self.nodes(&branch.body, &Scope::Unknown);
                self.else_nodes(branch.else_body.as_deref(), dot);
            }
            Node::Define { body, .. } => self.nodes(body, &Scope::Root),
            Node::Template { pipeline, .. } => {
                if let Some(pipeline) = pipeline {
                    self.pipeline(pipeline, dot);
                }
            }
            Node::Block { pipeline, body, .. } => {
                let inner = self.pipeline(pipeline, dot);
                self.nodes(body, &inner);
            }
        }
    }

    fn else_nodes(&mut self, nodes: Option<&[Node]>, dot: &Scope) {
        if let Some(nodes) = nodes {
            self.nodes(nodes, dot);
        }
    }

    /// Visit a pipeline; returns its value's scope when it is a single plain reference.
    fn pipeline(&mut self, pipeline: &Pipeline, dot: &Scope) -> Scope {
        let mut result = Scope::Unknown;
        for command in &pipeline.commands {
            let scope = self.command(command, dot);
            if pipeline.commands.len() == 1 {
                result = scope;
            }
        }
        for name in &pipeline.decl {
            self.vars.insert(name.clone(), result.clone());
        }
        result
    }

    fn command(&mut self, command: &Command, dot: &Scope) -> Scope {
        if let [Operand::Identifier(func), base, keys @ ..] = command.args.as_slice()
            && func == "index"
            && !keys.is_empty()
            && let Some(scope) = self.index_path(base, keys, dot)
        {
            self.record(&scope);
            return scope;
        }

        let mut last = Scope::Unknown;
        for operand in &command.args {
            last = self.operand(operand, dot);
        }
        if command.args.len() == 1 { last } else { Scope::Unknown }
    }

    /// `index <base> <literal keys>` as a values path, when every key is literal.
    fn index_path(&self, base: &Operand, keys: &[Operand], dot: &Scope) -> Option<Scope> {
        let mut scope = match base {
            Operand::Field(fields) => dot.clone().fields(fields),
            Operand::Variable { name, fields } => self.variable(name).fields(fields),
            Operand::Dot => dot.clone(),
            _ => return None,
        };
        for key in keys {
            scope = match key {
                Operand::String(name) => scope.field(name),
                Operand::Number(n) => scope.index(n.parse().ok()?),
                _ => return None,
            };
        }
        matches!(scope, Scope::Values(_)).then_some(scope)
    }

    fn variable(&self, name: &str) -> Scope {
        if name == "$" {
            Scope::Root
        } else {
            self.vars.get(name).cloned().unwrap_or(Scope::Unknown)
        }
    }

    fn operand(&mut self, operand: &Operand, dot: &Scope) -> Scope {
        let scope = match operand {
            Operand::Field(fields) => dot.clone().fields(fields),
            Operand::Variable { name, fields } => self.variable(name).fields(fields),
            Operand::Chain { pipeline, fields } => self.pipeline(pipeline, dot).fields(fields),
            Operand::Dot => dot.clone(),
            _ => return Scope::Unknown,
        };
        self.record(&scope);
        scope
    }
}

/// Collect the values paths one template references.
///
/// # Errors
///
/// Returns the parser error if the template is not valid.
pub fn template_references(src: &str) -> Result<BTreeSet<String>, ParseError> {
    let nodes = parse(src)?;
    let mut collector = Collector::default();
    collector.nodes(&nodes, &Scope::Root);
    Ok(collector.paths)
}

/// Collect the values paths referenced by a set of templates.
///
/// Templates that fail to parse are logged, listed in
/// [`ReferenceAnalysis::skipped`] and otherwise ignored.
#[must_use]
pub fn analyze_references(templates: &BTreeMap<String, String>) -> ReferenceAnalysis {
    let mut analysis = ReferenceAnalysis::default();
    for (name, src) in templates {
        match template_references(src) {
            Ok(paths) => analysis.paths.extend(paths),
            Err(e) => {
                tracing::warn!("Skipping template '{}': {}", name, e);
                analysis.skipped.push(SkippedTemplate {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    tracing::debug!(
        "Found {} values references in {} templates",
        analysis.paths.len(),
        templates.len() - analysis.skipped.len()
    );
    analysis
}
