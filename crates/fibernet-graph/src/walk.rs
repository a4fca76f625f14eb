//! Walk-of-interest synchronizer
//!
//! Plans the walk changes for affix, detach and move against the current
//! projection. Planning is pure: it returns the events to append and never
//! touches state, so a rejected request leaves every walk unchanged.
//!
//! A hop is the part of a cable's walk that runs through one conduit
//! segment. Its end nodes are fixed when the cable is affixed; the part in
//! between follows the conduit's walk.

use crate::projection::UtilityGraphProjection;
use fibernet_model::{
    EquipmentError, RouteNodeId, SpanEquipment, SpanEquipmentEvent, SpanEquipmentId, SpanSegmentId,
    UtilityNetworkHop, WalkOfInterest,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Read-only planner over a projection snapshot
#[derive(Debug, Clone, Copy)]
pub struct WalkSynchronizer<'a> {
    projection: &'a UtilityGraphProjection,
}

impl<'a> WalkSynchronizer<'a> {
    #[must_use]
    pub fn new(projection: &'a UtilityGraphProjection) -> Self {
        Self { projection }
    }

    /// Plan pulling a cable through a conduit segment at a route node
    ///
    /// The cable's sub-walk between the conduit's end nodes is replaced by
    /// the conduit walk, oriented in the cable's direction.
    ///
    /// # Errors
    /// Unknown equipment or segment, node not on both walks, conduit ends not
    /// on the cable walk, already affixed, overlap with an existing hop
    pub fn plan_affix(
        &self,
        cable_id: SpanEquipmentId,
        route_node_id: RouteNodeId,
        conduit_segment_id: SpanSegmentId,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        let (cable, cable_walk) = self.span_with_walk(cable_id)?;
        let segment = self
            .projection
            .try_get_graph_segment_ref(conduit_segment_id.uuid())
            .filter(|s| s.span_segment_id == conduit_segment_id)
            .ok_or(EquipmentError::ElementNotFound(conduit_segment_id.uuid()))?;
        if segment.span_equipment_id == cable_id {
            return Err(EquipmentError::AffixWalkMismatch(cable_id));
        }
        let (_, conduit_walk) = self.span_with_walk(segment.span_equipment_id)?;

        if cable.hop_through(conduit_segment_id).is_some() {
            return Err(EquipmentError::AlreadyAffixed {
                span_equipment_id: cable_id,
                segment_id: conduit_segment_id,
            });
        }
        for (id, walk) in [(cable_id.uuid(), &cable_walk), (segment.span_equipment_id.uuid(), &conduit_walk)] {
            if walk.node_position(route_node_id).is_none() {
                return Err(EquipmentError::NotAtRouteNode {
                    equipment_id: id,
                    route_node_id,
                });
            }
        }

        let (Some(a), Some(b)) = (
            cable_walk.node_position(conduit_walk.from_node_id()),
            cable_walk.node_position(conduit_walk.to_node_id()),
        ) else {
            return Err(EquipmentError::AffixWalkMismatch(cable_id));
        };
        let (start, end) = (a.min(b), a.max(b));
        let replacement = if a < b { conduit_walk.clone() } else { conduit_walk.reversed() };

        for hop in &cable.utility_network_hops {
            let (Some(hs), Some(he)) = (
                cable_walk.node_position(hop.from_node_id),
                cable_walk.node_position(hop.to_node_id),
            ) else {
                continue;
            };
            if start < he && hs < end {
                return Err(EquipmentError::IncompatibleWithExistingAffixes {
                    span_equipment_id: cable_id,
                    reason: format!(
                        "conduit segment {conduit_segment_id} overlaps the hop through {}",
                        hop.parent_span_segment_id
                    ),
                });
            }
        }

        let elements = cable_walk.elements();
        let hop = UtilityNetworkHop {
            from_node_id: elements[start],
            to_node_id: elements[end],
            parent_span_equipment_id: segment.span_equipment_id,
            parent_span_segment_id: conduit_segment_id,
            direct_walk: elements[start..=end].to_vec(),
        };
        let walk = cable_walk.splice(start, end, replacement.elements());
        if let Some(node) = walk.repeated_node() {
            debug!(cable = %cable_id, node = %node, "affix would loop the cable walk");
            return Err(EquipmentError::AffixWalkMismatch(cable_id));
        }
        debug!(cable = %cable_id, conduit_segment = %conduit_segment_id, len = walk.len(), "affix planned");

        Ok(SpanEquipmentEvent::AffixedToParent { id: cable_id, hop, walk })
    }

    /// Plan removing a cable from the conduit it runs through at a route node
    ///
    /// The first hop in walk order containing the node is removed and its
    /// direct walk restored.
    ///
    /// # Errors
    /// Unknown cable, or no hop at the node
    pub fn plan_detach(
        &self,
        cable_id: SpanEquipmentId,
        route_node_id: RouteNodeId,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        let (cable, cable_walk) = self.span_with_walk(cable_id)?;

        let found = cable.utility_network_hops.iter().find_map(|hop| {
            let start = cable_walk.node_position(hop.from_node_id)?;
            let end = cable_walk.node_position(hop.to_node_id)?;
            let (start, end) = (start.min(end), start.max(end));
            cable_walk.elements()[start..=end]
                .iter()
                .step_by(2)
                .any(|n| *n == route_node_id)
                .then_some((hop, start, end))
        });
        let Some((hop, start, end)) = found else {
            return Err(EquipmentError::NotAffixedAtRouteNode {
                span_equipment_id: cable_id,
                route_node_id,
            });
        };

        let walk = cable_walk.splice(start, end, &hop.direct_walk);
        debug!(cable = %cable_id, conduit_segment = %hop.parent_span_segment_id, "detach planned");

        Ok(SpanEquipmentEvent::DetachedFromParent {
            id: cable_id,
            hop: hop.clone(),
            walk,
        })
    }

    /// Plan moving a span equipment to a new walk
    ///
    /// Emits `Moved` for the equipment, then one `WalkRecomputed` per
    /// equipment threaded through it, transitively, in breadth-first order.
    ///
    /// # Errors
    /// `NoChange` for an identical walk, `SpanSegmentTerminatedAtMovedEnd`,
    /// `IncompatibleWithExistingAffixes` for own hops, container affixes or
    /// dependent hop ends the new walk drops
    pub fn plan_move(
        &self,
        id: SpanEquipmentId,
        new_walk: WalkOfInterest,
    ) -> Result<Vec<SpanEquipmentEvent>, EquipmentError> {
        let (span, old_walk) = self.span_with_walk(id)?;
        if new_walk == old_walk {
            return Err(EquipmentError::NoChange(id.uuid()));
        }

        check_terminated_ends(span, &old_walk, &new_walk)?;
        check_own_hops(span, &old_walk, &new_walk)?;
        check_container_affixes(span, &new_walk)?;

        let mut events = vec![SpanEquipmentEvent::Moved {
            id,
            old_walk,
            walk: new_walk.clone(),
        }];

        let mut pending: HashMap<SpanEquipmentId, (WalkOfInterest, WalkOfInterest)> = HashMap::new();
        let mut order: Vec<SpanEquipmentId> = Vec::new();
        let mut visited: HashSet<SpanEquipmentId> = HashSet::from([id]);
        let mut queue: VecDeque<(SpanEquipmentId, WalkOfInterest)> = VecDeque::from([(id, new_walk)]);

        while let Some((mover_id, mover_walk)) = queue.pop_front() {
            let mover = self.span(mover_id)?;
            let mut touched = Vec::new();

            for (_, segment) in mover.segments() {
                for dependent_id in self.projection.related_cables_by_conduit_segment_id(segment.id) {
                    if dependent_id == mover_id || (visited.contains(&dependent_id) && !pending.contains_key(&dependent_id)) {
                        continue;
                    }
                    let dependent = self.span(dependent_id)?;
                    let Some(hop) = dependent.hop_through(segment.id) else {
                        continue;
                    };

                    let replacement = mover_walk.sub_walk(hop.from_node_id, hop.to_node_id).ok_or_else(|| {
                        EquipmentError::IncompatibleWithExistingAffixes {
                            span_equipment_id: mover_id,
                            reason: format!(
                                "span equipment {dependent_id} depends on route nodes {} and {} which the new walk drops",
                                hop.from_node_id, hop.to_node_id
                            ),
                        }
                    })?;

                    let current = match pending.get(&dependent_id) {
                        Some((_, walk)) => walk.clone(),
                        None => self
                            .projection
                            .walk_of(dependent)
                            .ok_or(EquipmentError::SpanEquipmentNotFound(dependent_id))?,
                    };
                    let (Some(a), Some(b)) = (
                        current.node_position(hop.from_node_id),
                        current.node_position(hop.to_node_id),
                    ) else {
                        return Err(EquipmentError::IncompatibleWithExistingAffixes {
                            span_equipment_id: dependent_id,
                            reason: "hop end nodes missing from walk".to_string(),
                        });
                    };
                    let replacement = if a < b { replacement } else { replacement.reversed() };
                    let recomputed = current.splice(a.min(b), a.max(b), replacement.elements());
                    if let Some(node) = recomputed.repeated_node() {
                        return Err(EquipmentError::IncompatibleWithExistingAffixes {
                            span_equipment_id: dependent_id,
                            reason: format!("recomputed walk would pass route node {node} twice"),
                        });
                    }
                    check_container_affixes(dependent, &recomputed)?;

                    match pending.get_mut(&dependent_id) {
                        Some((_, walk)) => *walk = recomputed,
                        None => {
                            pending.insert(dependent_id, (current, recomputed));
                            order.push(dependent_id);
                        }
                    }
                    if !touched.contains(&dependent_id) {
                        touched.push(dependent_id);
                    }
                }
            }

            for dependent_id in touched {
                if visited.insert(dependent_id) {
                    if let Some((_, walk)) = pending.get(&dependent_id) {
                        queue.push_back((dependent_id, walk.clone()));
                    }
                }
            }
        }

        for dependent_id in order {
            let Some((old_walk, walk)) = pending.remove(&dependent_id) else {
                continue;
            };
            let hops = self.span(dependent_id)?.utility_network_hops.clone();
            events.push(SpanEquipmentEvent::WalkRecomputed {
                id: dependent_id,
                old_walk,
                walk,
                hops,
            });
        }

        debug!(span_equipment = %id, events = events.len(), "move planned");
        Ok(events)
    }

    fn span(&self, id: SpanEquipmentId) -> Result<&'a SpanEquipment, EquipmentError> {
        self.projection
            .try_get_equipment::<SpanEquipment>(id)
            .ok_or(EquipmentError::SpanEquipmentNotFound(id))
    }

    fn span_with_walk(&self, id: SpanEquipmentId) -> Result<(&'a SpanEquipment, WalkOfInterest), EquipmentError> {
        let span = self.span(id)?;
        let walk = self
            .projection
            .walk_of(span)
            .ok_or(EquipmentError::SpanEquipmentNotFound(id))?;
        Ok((span, walk))
    }
}

fn check_terminated_ends(
    span: &SpanEquipment,
    old_walk: &WalkOfInterest,
    new_walk: &WalkOfInterest,
) -> Result<(), EquipmentError> {
    let from_moved = old_walk.from_node_id() != new_walk.from_node_id();
    let to_moved = old_walk.to_node_id() != new_walk.to_node_id();
    for (_, segment) in span.segments() {
        if (from_moved && segment.from_terminal_id.is_some()) || (to_moved && segment.to_terminal_id.is_some()) {
            return Err(EquipmentError::SpanSegmentTerminatedAtMovedEnd(segment.id));
        }
    }
    Ok(())
}

/// Each hop's current sub-walk must reappear contiguously, same orientation, in order
fn check_own_hops(
    span: &SpanEquipment,
    old_walk: &WalkOfInterest,
    new_walk: &WalkOfInterest,
) -> Result<(), EquipmentError> {
    let mut cursor = 0;
    for hop in &span.utility_network_hops {
        let part = old_walk
            .sub_walk(hop.from_node_id, hop.to_node_id)
            .ok_or_else(|| EquipmentError::IncompatibleWithExistingAffixes {
                span_equipment_id: span.id,
                reason: format!("hop through {} no longer on current walk", hop.parent_span_segment_id),
            })?;
        let found = new_walk.elements()[cursor..]
            .windows(part.len())
            .position(|w| w == part.elements())
            .map(|p| p + cursor);
        match found {
            Some(start) => cursor = start + part.len() - 1,
            None => {
                return Err(EquipmentError::IncompatibleWithExistingAffixes {
                    span_equipment_id: span.id,
                    reason: format!(
                        "new walk does not contain the path through conduit segment {}",
                        hop.parent_span_segment_id
                    ),
                })
            }
        }
    }
    Ok(())
}

fn check_container_affixes(span: &SpanEquipment, walk: &WalkOfInterest) -> Result<(), EquipmentError> {
    match span
        .node_container_affixes
        .iter()
        .find(|a| walk.node_position(a.route_node_id).is_none())
    {
        Some(affix) => Err(EquipmentError::IncompatibleWithExistingAffixes {
            span_equipment_id: span.id,
            reason: format!(
                "span equipment is affixed to node container {} in route node {}",
                affix.node_container_id, affix.route_node_id
            ),
        }),
        None => Ok(()),
    }
}
