//! Effective model assembly.
//!
//! After the last phase every root is turned into its declared and effective
//! forms. Results are memoized per statement for the duration of one
//! assembly, and a statement that ends up among its own effective
//! substatements is reported instead of recursing forever.

use crate::error::{SourceError, SourceResult};
use crate::model::{DeclaredStatement, EffectiveStatement};
use crate::state::BuildState;
use crate::stmt::StmtId;
use std::collections::HashMap;
use std::sync::Arc;

/// Build-scoped memo and recursion tracker
pub(crate) struct Assembler<'a> {
    state: &'a BuildState,
    declared: HashMap<StmtId, Arc<DeclaredStatement>>,
    effective: HashMap<StmtId, Arc<EffectiveStatement>>,
    building: Vec<StmtId>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(state: &'a BuildState) -> Self {
        Self {
            state,
            declared: HashMap::new(),
            effective: HashMap::new(),
            building: Vec::new(),
        }
    }

    /// Declared form of `id` and its whole subtree
    pub(crate) fn declared(&mut self, id: StmtId) -> SourceResult<Arc<DeclaredStatement>> {
        if let Some(existing) = self.declared.get(&id) {
            return Ok(Arc::clone(existing));
        }
        let state = self.state;
        let ctx = state.stmt(id);
        let node = state.node(id);
        let (Some(keyword), Some(support)) = (node.keyword.clone(), node.definition.clone()) else {
            return Err(SourceError::at(
                format!("{} was never bound to a statement definition", node.raw_keyword),
                node.reference.as_ref(),
            ));
        };
        let substatements = node
            .children
            .iter()
            .map(|&child| self.declared(child))
            .collect::<SourceResult<Vec<_>>>()?;
        let declared = DeclaredStatement::new(
            keyword,
            node.raw_keyword.clone(),
            node.argument.clone(),
            node.raw_argument.clone(),
            substatements,
            node.reference.clone(),
        );
        let declared = Arc::new(support.refine_declared(&ctx, declared)?);
        self.declared.insert(id, Arc::clone(&declared));
        Ok(declared)
    }

    /// Effective form of `id`, including statements placed into it
    pub(crate) fn effective(&mut self, id: StmtId) -> SourceResult<Arc<EffectiveStatement>> {
        if let Some(existing) = self.effective.get(&id) {
            return Ok(Arc::clone(existing));
        }
        if self.building.contains(&id) {
            let ctx = self.state.stmt(id);
            return Err(SourceError::at(
                format!(
                    "{} {} is part of its own effective model",
                    ctx.raw_keyword(),
                    ctx.raw_argument().unwrap_or_default()
                ),
                ctx.reference(),
            ));
        }
        self.building.push(id);
        let built = self.build_effective(id);
        self.building.pop();
        let built = Arc::new(built?);
        self.effective.insert(id, Arc::clone(&built));
        Ok(built)
    }

    fn build_effective(&mut self, id: StmtId) -> SourceResult<EffectiveStatement> {
        let declared = self.declared(id)?;
        let state = self.state;
        let node = state.node(id);
        let mut substatements = Vec::with_capacity(node.children.len() + node.additions.len());
        for &child in &node.children {
            if state.node(child).supported {
                substatements.push(self.effective(child)?);
            }
        }
        for &(child, origin) in &node.additions {
            if state.node(child).supported {
                let placed = self.effective(child)?;
                substatements.push(Arc::new(placed.with_origin(origin)));
            }
        }
        let mut effective = EffectiveStatement::new(
            declared.keyword().clone(),
            node.argument.clone(),
            Some(declared),
            substatements,
        );
        if node.unknown {
            effective = effective.as_unknown();
        }
        match &node.definition {
            Some(support) => support.refine_effective(&state.stmt(id), effective),
            None => Ok(effective),
        }
    }

    /// Drop recursion tracking; memoized results go with it
    pub(crate) fn finish(mut self) {
        self.building.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::StatementOrigin;
    use crate::testing;

    #[test]
    fn test_assembles_declared_and_effective() {
        let (state, roots) = testing::built_state(vec![testing::module("foo", "urn:foo")
            .with(testing::container("c").with(testing::leaf("l")))]);
        let mut assembler = Assembler::new(&state);
        let declared = assembler.declared(roots[0]).unwrap();
        assert_eq!(declared.raw_argument(), Some("foo"));
        assert_eq!(declared.substatements().len(), 3);

        let effective = assembler.effective(roots[0]).unwrap();
        assert_eq!(effective.schema_tree().len(), 1);
        let again = assembler.effective(roots[0]).unwrap();
        assert!(Arc::ptr_eq(&effective, &again));
        assembler.finish();
    }

    #[test]
    fn test_unsupported_statements_are_skipped() {
        let (mut state, roots) = testing::built_state(vec![testing::module("foo", "urn:foo")
            .with(testing::container("c"))
            .with(testing::container("d"))]);
        let d = state.stmt(roots[0]).children_with("container").nth(1).unwrap().id();
        state.node_mut(d).supported = false;

        let mut assembler = Assembler::new(&state);
        let effective = assembler.effective(roots[0]).unwrap();
        assert_eq!(effective.children_named("container").count(), 1);
        let declared = assembler.declared(roots[0]).unwrap();
        assert_eq!(declared.substatements().len(), 4);
    }

    #[test]
    fn test_additions_carry_origin() {
        let (mut state, roots) = testing::built_state(vec![
            testing::module("foo", "urn:foo").with(testing::container("c")),
            testing::module("bar", "urn:bar").with(testing::leaf("x")),
        ]);
        let c = state.stmt(roots[0]).first_child("container").unwrap().id();
        let x = state.stmt(roots[1]).first_child("leaf").unwrap().id();
        state.node_mut(c).additions.push((x, StatementOrigin::AddedByAugmentation));

        let mut assembler = Assembler::new(&state);
        let foo = assembler.effective(roots[0]).unwrap();
        let container = foo.children_named("container").next().unwrap();
        let added = container.substatements().last().unwrap();
        assert_eq!(added.origin(), StatementOrigin::AddedByAugmentation);
        assert_eq!(container.schema_tree().len(), 1);

        let bar = assembler.effective(roots[1]).unwrap();
        assert_eq!(
            bar.children_named("leaf").next().unwrap().origin(),
            StatementOrigin::Declared
        );
    }

    #[test]
    fn test_self_inclusion_is_an_error() {
        let (mut state, roots) = testing::built_state(vec![
            testing::module("foo", "urn:foo").with(testing::container("c")),
        ]);
        let c = state.stmt(roots[0]).first_child("container").unwrap().id();
        state.node_mut(c).additions.push((c, StatementOrigin::AddedByAugmentation));

        let mut assembler = Assembler::new(&state);
        let err = assembler.effective(roots[0]).unwrap_err();
        assert!(err.message().contains("part of its own effective model"));
        assert!(assembler.building.is_empty());
    }
}
