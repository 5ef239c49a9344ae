//! Context translator graph.
//!
//! Translators map a caller's context type onto the context type a binding
//! declares. The graph is searched breadth-first, so the shortest path wins
//! and ties resolve to registration order. Finder edges (registered with no
//! source type) are applicable from any starting point, including the unit
//! context.

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::error::DiResult;
use crate::key::{ContextKind, TypeRef};

const MAX_TRANSLATION_HOPS: usize = 16;

type TranslateFn = Arc<dyn Fn(&Context) -> DiResult<Context> + Send + Sync>;

pub(crate) struct Edge {
    /// `None` marks a finder edge, applicable from any source context.
    from: Option<TypeRef>,
    to: TypeRef,
    translate: TranslateFn,
}

/// Mutable edge set used during composition.
#[derive(Default)]
pub(crate) struct TranslatorGraphBuilder {
    edges: Vec<Edge>,
}

impl TranslatorGraphBuilder {
    pub(crate) fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Registers a directed translator from context type `C` to `S`.
    pub(crate) fn register<C, S, F>(&mut self, f: F)
    where
        C: Send + Sync + 'static,
        S: Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<S> + Send + Sync + 'static,
    {
        let translate: TranslateFn = Arc::new(move |ctx: &Context| {
            let from = ctx.downcast::<C>()?;
            Ok(Context::of(f(from)))
        });
        self.edges.push(Edge {
            from: Some(TypeRef::of::<C>()),
            to: TypeRef::of::<S>(),
            translate,
        });
    }

    /// Registers a finder producing an `S` context from any caller context.
    pub(crate) fn register_finder<S, F>(&mut self, f: F)
    where
        S: Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        let translate: TranslateFn = Arc::new(move |_ctx: &Context| Ok(Context::of(f())));
        self.edges.push(Edge {
            from: None,
            to: TypeRef::of::<S>(),
            translate,
        });
    }

    pub(crate) fn freeze(self) -> TranslatorGraph {
        TranslatorGraph {
            edges: self.edges,
            memo: Mutex::new(HashMap::new()),
        }
    }
}

/// Immutable translator graph with memoized path search.
pub(crate) struct TranslatorGraph {
    edges: Vec<Edge>,
    // (source type, target type) -> discovered edge path, None for no path.
    memo: Mutex<HashMap<(Option<TypeId>, TypeId), Option<Vec<usize>>>>,
}

impl TranslatorGraph {
    /// Translates `context` into the binding's declared context type.
    ///
    /// Identity when the binding accepts any context or the types already
    /// match; `Ok(None)` when no path exists.
    pub(crate) fn translate(
        &self,
        context: &Context,
        declared: &ContextKind,
    ) -> DiResult<Option<Context>> {
        let to = match declared {
            ContextKind::Any => return Ok(Some(context.clone())),
            ContextKind::Exact(id, _) => *id,
        };
        if context.type_id() == Some(to) {
            return Ok(Some(context.clone()));
        }
        let path = {
            let mut memo = self.memo.lock().unwrap();
            memo.entry((context.type_id(), to))
                .or_insert_with(|| self.find_path(context.type_id(), to))
                .clone()
        };
        let Some(path) = path else {
            return Ok(None);
        };
        let mut current = context.clone();
        for index in path {
            current = (self.edges[index].translate)(&current)?;
        }
        Ok(Some(current))
    }

    fn find_path(&self, from: Option<TypeId>, to: TypeId) -> Option<Vec<usize>> {
        let mut visited: HashSet<TypeId> = HashSet::new();
        if let Some(start) = from {
            visited.insert(start);
        }
        let mut queue: VecDeque<(Option<TypeId>, Vec<usize>)> = VecDeque::new();
        queue.push_back((from, Vec::new()));

        while let Some((node, path)) = queue.pop_front() {
            if path.len() >= MAX_TRANSLATION_HOPS {
                continue;
            }
            for (index, edge) in self.edges.iter().enumerate() {
                let applicable = match (edge.from, node) {
                    (None, _) => true,
                    (Some(source), Some(at)) => source.id == at,
                    (Some(_), None) => false,
                };
                if !applicable || !visited.insert(edge.to.id) {
                    continue;
                }
                let mut next = path.clone();
                next.push(index);
                if edge.to.id == to {
                    return Some(next);
                }
                queue.push_back((Some(edge.to.id), next));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A(u32);
    struct B(u32);
    struct C(u32);

    fn graph() -> TranslatorGraphBuilder {
        TranslatorGraphBuilder::new()
    }

    #[test]
    fn identity_when_types_match() {
        let g = graph().freeze();
        let ctx = Context::new(A(7));
        let out = g.translate(&ctx, &ContextKind::of::<A>()).unwrap().unwrap();
        assert_eq!(out.downcast::<A>().unwrap().0, 7);
    }

    #[test]
    fn any_declared_context_passes_through() {
        let g = graph().freeze();
        let ctx = Context::new(A(7));
        assert!(g.translate(&ctx, &ContextKind::Any).unwrap().is_some());
    }

    #[test]
    fn composes_multi_hop_paths() {
        let mut b = graph();
        b.register::<A, B, _>(|a| Arc::new(B(a.0 + 1)));
        b.register::<B, C, _>(|x| Arc::new(C(x.0 * 10)));
        let g = b.freeze();
        let out = g
            .translate(&Context::new(A(4)), &ContextKind::of::<C>())
            .unwrap()
            .unwrap();
        assert_eq!(out.downcast::<C>().unwrap().0, 50);
    }

    #[test]
    fn missing_path_is_none() {
        let mut b = graph();
        b.register::<A, B, _>(|a| Arc::new(B(a.0)));
        let g = b.freeze();
        assert!(g
            .translate(&Context::new(B(1)), &ContextKind::of::<A>())
            .unwrap()
            .is_none());
    }

    #[test]
    fn finder_applies_from_the_unit_context() {
        let mut b = graph();
        b.register_finder::<B, _>(|| Arc::new(B(99)));
        let g = b.freeze();
        let out = g
            .translate(&Context::any(), &ContextKind::of::<B>())
            .unwrap()
            .unwrap();
        assert_eq!(out.downcast::<B>().unwrap().0, 99);
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let mut b = graph();
        b.register::<A, B, _>(|a| Arc::new(B(a.0)));
        b.register::<B, A, _>(|x| Arc::new(A(x.0)));
        let g = b.freeze();
        assert!(g
            .translate(&Context::new(A(1)), &ContextKind::of::<C>())
            .unwrap()
            .is_none());
    }
}
