use crate::asm::Label;

/// Handle to a scope inside a [`ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    /// Only the two outermost scopes live at a fixed address.
    location: Option<Label>,
    names: Vec<String>,
}

/// Where a name lives, as seen from the scope it was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Slot `offset` of the record placed at `location`.
    Static { location: Label, offset: usize },
    /// Slot `offset` of the record reached by following `levels_up` parent pointers.
    Dynamic { levels_up: usize, offset: usize },
}

/// The compile-time symbol table: a tree of scopes with parent links.
///
/// Scope 0 holds the built-ins and scope 1 the globals; both are static.
/// Every other scope mirrors a record that is allocated at runtime.
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub const BUILTINS: ScopeId = ScopeId(0);
    pub const GLOBALS: ScopeId = ScopeId(1);

    pub fn new() -> Self {
        ScopeArena {
            scopes: vec![
                Scope { parent: None, location: Some(Label::BUILTIN_SCOPE), names: Vec::new() },
                Scope {
                    parent: Some(Self::BUILTINS),
                    location: Some(Label::GLOBAL_SCOPE),
                    names: Vec::new(),
                },
            ],
        }
    }

    /// Open a dynamic scope under `parent`.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope { parent: Some(parent), location: None, names: Vec::new() });
        id
    }

    /// Append a name to the scope's slots and return its slot index.
    pub fn bind(&mut self, scope: ScopeId, name: &str) -> usize {
        let names = &mut self.scopes[scope.0].names;
        names.push(name.to_string());
        names.len() - 1
    }

    pub fn names(&self, scope: ScopeId) -> &[String] {
        &self.scopes[scope.0].names
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn location(&self, scope: ScopeId) -> Option<Label> {
        self.scopes[scope.0].location
    }

    /// Search `scope` and then its ancestors. The nearest binding wins.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<Resolution> {
        let here = &self.scopes[scope.0];
        if let Some(offset) = here.names.iter().position(|n| n == name) {
            return Some(match here.location {
                Some(location) => Resolution::Static { location, offset },
                None => Resolution::Dynamic { levels_up: 0, offset },
            });
        }
        match self.resolve(here.parent?, name)? {
            found @ Resolution::Static { .. } => Some(found),
            Resolution::Dynamic { levels_up, offset } => {
                Some(Resolution::Dynamic { levels_up: levels_up + 1, offset })
            }
        }
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_resolve_statically() {
        let mut arena = ScopeArena::new();
        arena.bind(ScopeArena::GLOBALS, "x");
        arena.bind(ScopeArena::GLOBALS, "y");
        assert_eq!(
            arena.resolve(ScopeArena::GLOBALS, "y"),
            Some(Resolution::Static { location: Label::GLOBAL_SCOPE, offset: 1 })
        );
    }

    #[test]
    fn static_resolution_propagates_through_dynamic_scopes() {
        let mut arena = ScopeArena::new();
        arena.bind(ScopeArena::BUILTINS, "add");
        let a = arena.child(ScopeArena::GLOBALS);
        let b = arena.child(a);
        assert_eq!(
            arena.resolve(b, "add"),
            Some(Resolution::Static { location: Label::BUILTIN_SCOPE, offset: 0 })
        );
    }

    #[test]
    fn dynamic_resolution_counts_levels() {
        let mut arena = ScopeArena::new();
        let outer = arena.child(ScopeArena::GLOBALS);
        arena.bind(outer, "k");
        arena.bind(outer, "n");
        let mid = arena.child(outer);
        let inner = arena.child(mid);
        assert_eq!(arena.resolve(outer, "n"), Some(Resolution::Dynamic { levels_up: 0, offset: 1 }));
        assert_eq!(arena.resolve(inner, "n"), Some(Resolution::Dynamic { levels_up: 2, offset: 1 }));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut arena = ScopeArena::new();
        arena.bind(ScopeArena::GLOBALS, "k");
        let local = arena.child(ScopeArena::GLOBALS);
        arena.bind(local, "k");
        assert_eq!(arena.resolve(local, "k"), Some(Resolution::Dynamic { levels_up: 0, offset: 0 }));
    }

    #[test]
    fn missing_name_is_none() {
        let mut arena = ScopeArena::new();
        let local = arena.child(ScopeArena::GLOBALS);
        assert_eq!(arena.resolve(local, "nope"), None);
    }

    #[test]
    fn bind_returns_slot_index() {
        let mut arena = ScopeArena::new();
        let s = arena.child(ScopeArena::GLOBALS);
        assert_eq!(arena.bind(s, "a"), 0);
        assert_eq!(arena.bind(s, "b"), 1);
        assert_eq!(arena.names(s), &["a".to_string(), "b".to_string()]);
        assert_eq!(arena.parent(s), Some(ScopeArena::GLOBALS));
        assert_eq!(arena.location(s), None);
    }
}
