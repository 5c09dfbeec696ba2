use crate::models::{CausalRelationship, Entity, EntityId, MedicalContext};

/// Entities and relationships produced while processing one message.
///
/// Ids continue the session's running count, so they stay valid when the arena
/// is merged into the `MedicalContext` at the end of the turn.
#[derive(Debug, Clone, Default)]
pub struct TurnArena {
    base: usize,
    entities: Vec<Entity>,
    relationships: Vec<CausalRelationship>,
}

impl TurnArena {
    pub fn new(base: usize) -> Self {
        Self {
            base,
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn for_context(context: &MedicalContext) -> Self {
        Self::new(context.next_entity_id())
    }

    /// Allocate the next id and store the entity built for it.
    pub fn alloc(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = EntityId(self.base + self.entities.len());
        let entity = build(id);
        debug_assert_eq!(entity.id, id);
        self.entities.push(entity);
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        id.0.checked_sub(self.base).and_then(|i| self.entities.get(i))
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relationships(&self) -> &[CausalRelationship] {
        &self.relationships
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Record a relationship. Both ends must resolve in the arena or the context, and an
    /// identical cause/effect/context triple is only recorded once.
    pub fn push_relationship(&mut self, rel: CausalRelationship, context: &MedicalContext) -> bool {
        let resolvable = |id: EntityId| self.get(id).is_some() || context.entity(id).is_some();
        if !resolvable(rel.cause) || !resolvable(rel.effect) || rel.cause == rel.effect {
            return false;
        }
        let duplicate = self
            .relationships
            .iter()
            .chain(context.relationships.iter())
            .any(|r| r.cause == rel.cause && r.effect == rel.effect && r.context == rel.context);
        if duplicate {
            return false;
        }
        self.relationships.push(rel);
        true
    }

    /// Move everything into the session context.
    pub fn merge_into(self, context: &mut MedicalContext) {
        debug_assert_eq!(self.base, context.entities.len());
        context.entities.extend(self.entities);
        context.relationships.extend(self.relationships);
    }
}

/// Read-only view over prior session entities and the current turn's arena.
#[derive(Clone, Copy)]
pub struct EvidenceView<'a> {
    pub context: &'a MedicalContext,
    pub arena: &'a TurnArena,
}

impl<'a> EvidenceView<'a> {
    pub fn new(context: &'a MedicalContext, arena: &'a TurnArena) -> Self {
        Self { context, arena }
    }

    pub fn get(&self, id: EntityId) -> Option<&'a Entity> {
        if id.0 < self.arena.base {
            self.context.entity(id)
        } else {
            self.arena.get(id)
        }
    }

    /// Prior entities first, then this turn's.
    pub fn entities(&self) -> impl Iterator<Item = &'a Entity> + 'a {
        self.context.entities.iter().chain(self.arena.entities.iter())
    }

    pub fn relationships(&self) -> impl Iterator<Item = &'a CausalRelationship> + 'a {
        self.context
            .relationships
            .iter()
            .chain(self.arena.relationships.iter())
    }

    pub fn turn_entities(&self) -> &'a [Entity] {
        &self.arena.entities
    }

    /// Index a relationship would have once merged into the context.
    pub fn relationship_index(&self, turn_index: usize) -> usize {
        self.context.relationships.len() + turn_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CausalContext, ClinicalSignificance, EntityKind, PatternId, SourceSpan,
    };

    fn entity(id: EntityId, name: &str) -> Entity {
        Entity {
            id,
            kind: EntityKind::AssociatedSymptom {
                symptom: name.into(),
                probability: 0.9,
                urgency_contribution: 0.3,
                primary: true,
                body_site: None,
            },
            confidence: 0.8,
            span: SourceSpan {
                start: 0,
                end: name.len(),
                text: name.into(),
            },
            pattern_id: PatternId(0),
            significance: ClinicalSignificance::Moderate,
            uncertainty: vec![],
        }
    }

    #[test]
    fn ids_continue_from_context() {
        let mut ctx = MedicalContext::new();
        let mut first = TurnArena::for_context(&ctx);
        first.alloc(|id| entity(id, "nausea"));
        first.merge_into(&mut ctx);

        let mut second = TurnArena::for_context(&ctx);
        let id = second.alloc(|id| entity(id, "vomiting"));
        assert_eq!(id, EntityId(1));

        let view = EvidenceView::new(&ctx, &second);
        assert_eq!(view.get(EntityId(0)).map(Entity::label), Some("nausea"));
        assert_eq!(view.get(EntityId(1)).map(Entity::label), Some("vomiting"));
        assert!(view.get(EntityId(2)).is_none());
        assert_eq!(view.entities().count(), 2);
    }

    #[test]
    fn relationships_require_both_entities() {
        let ctx = MedicalContext::new();
        let mut arena = TurnArena::for_context(&ctx);
        let a = arena.alloc(|id| entity(id, "abdominal pain"));
        let b = arena.alloc(|id| entity(id, "vomiting"));
        let rel = |cause, effect| CausalRelationship {
            cause,
            effect,
            context: CausalContext::Associative,
            mechanism: "co-reported".into(),
            confidence: 0.6,
            significance: ClinicalSignificance::Moderate,
        };

        assert!(arena.push_relationship(rel(a, b), &ctx));
        assert!(!arena.push_relationship(rel(a, b), &ctx));
        assert!(!arena.push_relationship(rel(a, EntityId(9)), &ctx));
        assert_eq!(arena.relationships().len(), 1);
    }
}
