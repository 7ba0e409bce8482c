//! # Patterns
//!
//! A pattern is a named list of blocks that can embed other patterns through
//! `core/pattern` blocks carrying a `slug` attribute. Embedding must never
//! loop, so every "pattern A embeds pattern B" edge goes through a
//! [`PatternRecursionDetector`] which rejects edges that close a cycle.
//!
//! ```text
//! A ──▶ B ──▶ C        ok
//! A ──▶ B ──▶ A        PatternCycleError { pattern: "B", path: [B, A, B] }
//! ```
//!
//! A detector belongs to a single render pass. Rejected edges stay in the
//! graph until the caller removes them with
//! [`PatternRecursionDetector::remove_dependency`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{debug, warn};
use thiserror::Error;

use crate::blocks::{Block, MISSING_BLOCK, PATTERN_BLOCK};

/// Attribute of a `core/pattern` block naming the embedded pattern.
pub const SLUG_ATTRIBUTE: &str = "slug";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pattern {pattern:?} cannot embed {dependency:?}: {}", path.join(" -> "))]
pub struct PatternCycleError {
    pub pattern: String,
    pub dependency: String,
    /// The cycle, starting and ending at the same pattern.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub blocks: Vec<Block>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }
}

/// Directed graph of pattern embeddings, checked for cycles on every insert.
#[derive(Debug, Default, Clone)]
pub struct PatternRecursionDetector {
    graph: BTreeMap<String, BTreeSet<String>>,
}

impl PatternRecursionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edge for every pattern reference inside `pattern.blocks`,
    /// visiting blocks depth first. Stops at the first cycle.
    pub fn parse_pattern_dependencies(&mut self, pattern: &Pattern) -> Result<(), PatternCycleError> {
        let mut queue: VecDeque<&Block> = pattern.blocks.iter().collect();
        while let Some(block) = queue.pop_front() {
            for inner in block.inner_blocks.iter().rev() {
                queue.push_front(inner);
            }
            if block.name == PATTERN_BLOCK
                && let Some(slug) = block.attribute(SLUG_ATTRIBUTE)
            {
                self.depends_on(&pattern.name, slug)?;
            }
        }
        Ok(())
    }

    /// Adds the edge `pattern → dependency` and checks the graph reachable
    /// from `pattern` for cycles. The edge is kept even when this fails.
    pub fn depends_on(&mut self, pattern: &str, dependency: &str) -> Result<(), PatternCycleError> {
        self.graph
            .entry(pattern.to_string())
            .or_default()
            .insert(dependency.to_string());

        let mut visited = BTreeSet::new();
        let mut current_path = Vec::new();
        match self.find_cycle(pattern, &mut visited, &mut current_path) {
            Some(path) => Err(PatternCycleError {
                pattern: pattern.to_string(),
                dependency: dependency.to_string(),
                path,
            }),
            None => Ok(()),
        }
    }

    /// Depth-first search; returns the cycle when a neighbour is already on
    /// the current path.
    fn find_cycle<'g>(
        &'g self,
        node: &'g str,
        visited: &mut BTreeSet<&'g str>,
        current_path: &mut Vec<&'g str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        current_path.push(node);
        for neighbour in self.graph.get(node).into_iter().flatten() {
            if let Some(start) = current_path.iter().position(|n| *n == neighbour.as_str()) {
                let mut cycle: Vec<String> =
                    current_path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(neighbour.clone());
                return Some(cycle);
            }
            if !visited.contains(neighbour.as_str())
                && let Some(cycle) = self.find_cycle(neighbour, visited, current_path)
            {
                return Some(cycle);
            }
        }
        current_path.pop();
        None
    }

    /// Removes `pattern → dependency`; returns whether it existed.
    pub fn remove_dependency(&mut self, pattern: &str, dependency: &str) -> bool {
        let Some(dependencies) = self.graph.get_mut(pattern) else {
            return false;
        };
        let removed = dependencies.remove(dependency);
        if dependencies.is_empty() {
            self.graph.remove(pattern);
        }
        removed
    }

    /// Patterns directly embedded by `pattern`.
    pub fn dependencies(&self, pattern: &str) -> impl Iterator<Item = &str> {
        self.graph
            .get(pattern)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.graph.clear();
    }
}

/// Known patterns by name.
#[derive(Debug, Default, Clone)]
pub struct PatternRegistry {
    patterns: BTreeMap<String, Pattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pattern`, returning the one it replaces.
    pub fn register(&mut self, pattern: Pattern) -> Option<Pattern> {
        self.patterns.insert(pattern.name.clone(), pattern)
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Replaces every `core/pattern` reference in `blocks` by the referenced
/// pattern's blocks, recursively.
///
/// References that are unknown or would embed a pattern inside itself become
/// `core/missing` blocks carrying the reason.
pub fn expand_patterns(
    blocks: &[Block],
    patterns: &PatternRegistry,
    detector: &mut PatternRecursionDetector,
) -> Vec<Block> {
    expand_within(None, blocks, patterns, detector)
}

fn expand_within(
    owner: Option<&str>,
    blocks: &[Block],
    patterns: &PatternRegistry,
    detector: &mut PatternRecursionDetector,
) -> Vec<Block> {
    let mut expanded = Vec::with_capacity(blocks.len());
    for block in blocks {
        let slug = (block.name == PATTERN_BLOCK)
            .then(|| block.attribute(SLUG_ATTRIBUTE))
            .flatten();
        let Some(slug) = slug else {
            let mut block = block.clone();
            block.inner_blocks = expand_within(owner, &block.inner_blocks, patterns, detector);
            expanded.push(block);
            continue;
        };

        let Some(pattern) = patterns.get(slug) else {
            warn!("pattern {slug:?} is not registered");
            expanded.push(missing_block(block, slug, "pattern not found"));
            continue;
        };

        if let Some(owner) = owner
            && let Err(err) = detector.depends_on(owner, slug)
        {
            warn!("{err}");
            detector.remove_dependency(owner, slug);
            expanded.push(missing_block(block, slug, &err.to_string()));
            continue;
        }

        debug!("expanding pattern {slug:?}");
        expanded.extend(expand_within(Some(slug), &pattern.blocks, patterns, detector));
    }
    expanded
}

fn missing_block(reference: &Block, slug: &str, reason: &str) -> Block {
    Block::new(
        MISSING_BLOCK,
        BTreeMap::from([
            ("originalName".to_string(), reference.name.clone()),
            (SLUG_ATTRIBUTE.to_string(), slug.to_string()),
            ("reason".to_string(), reason.to_string()),
        ]),
        Vec::new(),
    )
}
