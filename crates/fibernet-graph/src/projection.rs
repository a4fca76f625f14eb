//! Utility graph projection
//!
//! Derived state folded from the domain event stream: the catalog, every
//! equipment aggregate, the id-to-kind index, route network interests, the
//! name and related-cables indices and the connectivity graph.
//!
//! [`UtilityGraphProjection::apply`] checks an event against current state
//! before touching anything, then commits it in one infallible step. A
//! failed check is a [`ProjectionError`] and leaves the state unchanged.

use crate::element::{ElementRef, SpanSegmentRef};
use crate::error::ProjectionError;
use crate::graph::{ConnectivityGraph, GraphEdge};
use crate::index::{NameIndex, RelatedCablesIndex};
use fibernet_model::{
    CatalogEvent, ConnectivityEvent, DomainEvent, Equipment, InterestId, NodeContainer,
    NodeContainerEvent, NodeContainerId, PlacedEquipment, RouteElementId, RouteNetworkInterest,
    RouteNodeId, SpanEquipment, SpanEquipmentEvent, SpanEquipmentId, SpanSegmentEnd,
    SpanSegmentId, SpanStructure, SpecificationCatalog, Terminal, TerminalConnection, TerminalConnectionId,
    TerminalDirection, TerminalEquipment, TerminalEquipmentEvent, TerminalEquipmentId, TerminalId,
    TerminalStructure, WalkOfInterest,
};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

/// Counters reported by `stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionStats {
    pub applied_events: u64,
    pub span_equipment: usize,
    pub node_containers: usize,
    pub terminal_equipment: usize,
    pub terminal_connections: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UtilityGraphProjection {
    catalog: SpecificationCatalog,
    equipment: HashMap<Uuid, Equipment>,
    elements: HashMap<Uuid, ElementRef>,
    interests: HashMap<InterestId, RouteNetworkInterest>,
    names: NameIndex,
    related_cables: RelatedCablesIndex,
    container_by_route_node: HashMap<RouteNodeId, NodeContainerId>,
    span_equipment_by_route_element: HashMap<RouteElementId, BTreeSet<SpanEquipmentId>>,
    connections: HashMap<TerminalConnectionId, TerminalConnection>,
    graph: ConnectivityGraph,
    applied_events: u64,
}

impl UtilityGraphProjection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold events from the start of the stream
    ///
    /// # Errors
    /// First event that does not fit the state built so far
    pub fn rebuild<'a, I>(events: I) -> Result<Self, ProjectionError>
    where
        I: IntoIterator<Item = &'a DomainEvent>,
    {
        let mut projection = Self::new();
        for event in events {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    /// Fold one event and return the route network elements it affects
    ///
    /// # Errors
    /// `ProjectionError` if the event contradicts current state; nothing is
    /// modified in that case
    pub fn apply(&mut self, event: &DomainEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        let affected = self.check(event)?;
        self.commit(event);
        self.applied_events += 1;
        debug!(
            category = event.category(),
            applied = self.applied_events,
            affected = affected.len(),
            "event applied"
        );
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Read API
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &SpecificationCatalog {
        &self.catalog
    }

    /// Typed lookup over the shared equipment id space
    #[must_use]
    pub fn try_get_equipment<T: PlacedEquipment>(&self, id: impl Into<Uuid>) -> Option<&T> {
        self.equipment.get(&id.into()).and_then(T::from_equipment)
    }

    #[must_use]
    pub fn equipment(&self, id: Uuid) -> Option<&Equipment> {
        self.equipment.get(&id)
    }

    /// Kind and ancestors of any registered id
    #[must_use]
    pub fn element(&self, id: Uuid) -> Option<ElementRef> {
        self.elements.get(&id).copied()
    }

    /// Case-insensitive exact name lookup
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> BTreeSet<Uuid> {
        self.names.lookup(name)
    }

    #[must_use]
    pub fn search_by_name_prefix(&self, prefix: &str) -> Vec<Uuid> {
        self.names.search_prefix(prefix)
    }

    #[must_use]
    pub fn name_index(&self) -> &NameIndex {
        &self.names
    }

    /// Cables currently affixed to a conduit segment
    #[must_use]
    pub fn related_cables_by_conduit_segment_id(&self, segment: SpanSegmentId) -> BTreeSet<SpanEquipmentId> {
        self.related_cables.get(segment)
    }

    /// Resolve a segment, structure or span equipment id to a segment
    ///
    /// Structures resolve to their first segment; span equipment to the first
    /// segment of the outer structure.
    #[must_use]
    pub fn try_get_graph_segment_ref(&self, id: Uuid) -> Option<SpanSegmentRef> {
        let (equipment_id, structure_id, segment_id) = match self.element(id)? {
            ElementRef::SpanSegment {
                span_equipment_id,
                span_structure_id,
                span_segment_id,
            } => (span_equipment_id, Some(span_structure_id), Some(span_segment_id)),
            ElementRef::SpanStructure {
                span_equipment_id,
                span_structure_id,
            } => (span_equipment_id, Some(span_structure_id), None),
            ElementRef::SpanEquipment(span_equipment_id) => (span_equipment_id, None, None),
            _ => return None,
        };

        let span = self.try_get_equipment::<SpanEquipment>(equipment_id)?;
        let structure = match structure_id {
            Some(sid) => span.structure(sid)?,
            None => span.root_structure()?,
        };
        let segment = match segment_id {
            Some(sid) => structure.span_segments.iter().find(|s| s.id == sid)?,
            None => structure.span_segments.first()?,
        };

        Some(SpanSegmentRef {
            span_equipment_id: span.id,
            span_structure_id: structure.id,
            span_segment_id: segment.id,
            structure_level: structure.level,
            structure_position: structure.position,
            from_terminal_id: segment.from_terminal_id,
            to_terminal_id: segment.to_terminal_id,
        })
    }

    #[must_use]
    pub fn interest(&self, id: InterestId) -> Option<&RouteNetworkInterest> {
        self.interests.get(&id)
    }

    /// Current walk of a span equipment
    #[must_use]
    pub fn walk_of(&self, span: &SpanEquipment) -> Option<WalkOfInterest> {
        self.interests.get(&span.walk_of_interest_id)?.as_walk()
    }

    #[must_use]
    pub fn span_walk(&self, id: SpanEquipmentId) -> Option<WalkOfInterest> {
        self.walk_of(self.try_get_equipment::<SpanEquipment>(id)?)
    }

    #[must_use]
    pub fn node_container_at(&self, route_node_id: RouteNodeId) -> Option<&NodeContainer> {
        let id = self.container_by_route_node.get(&route_node_id)?;
        self.try_get_equipment(*id)
    }

    /// Span equipment whose walk passes the element, in id order
    #[must_use]
    pub fn span_equipment_at(&self, route_element_id: RouteElementId) -> Vec<&SpanEquipment> {
        self.span_equipment_by_route_element
            .get(&route_element_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.try_get_equipment(*id))
            .collect()
    }

    /// Route node of the container holding the terminal equipment
    #[must_use]
    pub fn route_node_of(&self, equipment: &TerminalEquipment) -> Option<RouteNodeId> {
        self.try_get_equipment::<NodeContainer>(equipment.node_container_id)
            .map(|c| c.route_node_id)
    }

    /// Terminal with its structure and equipment
    #[must_use]
    pub fn terminal(&self, id: TerminalId) -> Option<(&TerminalEquipment, &TerminalStructure, &Terminal)> {
        let ElementRef::Terminal {
            terminal_equipment_id, ..
        } = self.element(id.uuid())?
        else {
            return None;
        };
        let equipment = self.try_get_equipment::<TerminalEquipment>(terminal_equipment_id)?;
        let (structure, terminal) = equipment.terminal(id)?;
        Some((equipment, structure, terminal))
    }

    #[must_use]
    pub fn connection(&self, id: TerminalConnectionId) -> Option<&TerminalConnection> {
        self.connections.get(&id)
    }

    /// Patch connection leaving or entering a terminal
    #[must_use]
    pub fn connection_at(&self, terminal_id: TerminalId, direction: Direction) -> Option<&TerminalConnection> {
        self.connections.values().find(|c| match direction {
            Direction::Outgoing => c.from_terminal_id == terminal_id,
            Direction::Incoming => c.to_terminal_id == terminal_id,
        })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    #[must_use]
    pub fn stats(&self) -> ProjectionStats {
        let mut stats = ProjectionStats {
            applied_events: self.applied_events,
            terminal_connections: self.connections.len(),
            graph_nodes: self.graph.node_count(),
            graph_edges: self.graph.edge_count(),
            ..ProjectionStats::default()
        };
        for equipment in self.equipment.values() {
            match equipment {
                Equipment::Span(_) => stats.span_equipment += 1,
                Equipment::NodeContainer(_) => stats.node_containers += 1,
                Equipment::Terminal(_) => stats.terminal_equipment += 1,
            }
        }
        stats
    }

    // ------------------------------------------------------------------
    // Check
    // ------------------------------------------------------------------

    fn check(&self, event: &DomainEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        match event {
            DomainEvent::Catalog(_) => Ok(Vec::new()),
            DomainEvent::SpanEquipment(e) => self.check_span(e),
            DomainEvent::NodeContainer(e) => self.check_container(e),
            DomainEvent::TerminalEquipment(e) => self.check_terminal_equipment(e),
            DomainEvent::Connectivity(e) => self.check_connectivity(e),
        }
    }

    fn check_span(&self, event: &SpanEquipmentEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        if let SpanEquipmentEvent::PlacedInRouteNetwork { equipment, walk } = event {
            self.ensure_fresh(equipment.id.uuid())?;
            if self.interests.contains_key(&equipment.walk_of_interest_id) {
                return Err(ProjectionError::DuplicateElement(equipment.walk_of_interest_id.uuid()));
            }
            for structure in &equipment.span_structures {
                self.ensure_fresh(structure.id.uuid())?;
                for segment in &structure.span_segments {
                    self.ensure_fresh(segment.id.uuid())?;
                }
            }
            return Ok(walk.elements().to_vec());
        }

        let id = event.span_equipment_id();
        let span = self
            .try_get_equipment::<SpanEquipment>(id)
            .ok_or(ProjectionError::UnknownElement(id.uuid()))?;
        let current = self
            .walk_of(span)
            .ok_or(ProjectionError::UnknownInterest(span.walk_of_interest_id))?;

        match event {
            SpanEquipmentEvent::PlacedInRouteNetwork { .. } => Ok(Vec::new()),
            SpanEquipmentEvent::NamingInfoChanged { .. }
            | SpanEquipmentEvent::ManufacturerChanged { .. }
            | SpanEquipmentEvent::AffixedToNodeContainer { .. }
            | SpanEquipmentEvent::DetachedFromNodeContainer { .. } => Ok(current.elements().to_vec()),
            SpanEquipmentEvent::AdditionalStructuresAdded { structures, .. } => {
                for structure in structures {
                    self.ensure_fresh(structure.id.uuid())?;
                    for segment in &structure.span_segments {
                        self.ensure_fresh(segment.id.uuid())?;
                    }
                }
                Ok(current.elements().to_vec())
            }
            SpanEquipmentEvent::Moved { old_walk, walk, .. }
            | SpanEquipmentEvent::WalkRecomputed { old_walk, walk, .. } => {
                if *old_walk != current {
                    return Err(ProjectionError::IndexInconsistent(format!(
                        "walk of span equipment {id} differs from the walk the move was planned against"
                    )));
                }
                Ok(union(&current, walk))
            }
            SpanEquipmentEvent::AffixedToParent { hop, walk, .. } => {
                self.ensure_segment(hop.parent_span_segment_id)?;
                if self.related_cables.contains(hop.parent_span_segment_id, id) {
                    return Err(ProjectionError::IndexInconsistent(format!(
                        "span equipment {id} already indexed under conduit segment {}",
                        hop.parent_span_segment_id
                    )));
                }
                Ok(union(&current, walk))
            }
            SpanEquipmentEvent::DetachedFromParent { hop, walk, .. } => {
                if !self.related_cables.contains(hop.parent_span_segment_id, id) {
                    return Err(ProjectionError::IndexInconsistent(format!(
                        "span equipment {id} not indexed under conduit segment {}",
                        hop.parent_span_segment_id
                    )));
                }
                Ok(union(&current, walk))
            }
            SpanEquipmentEvent::SegmentsConnectedToTerminals {
                route_node_id, connects, ..
            } => {
                for connect in connects {
                    if span.segment(connect.span_segment_id).is_none() {
                        return Err(ProjectionError::UnknownElement(connect.span_segment_id.uuid()));
                    }
                    if !self.elements.get(&connect.terminal_id.uuid()).is_some_and(ElementRef::is_terminal) {
                        return Err(ProjectionError::UnknownElement(connect.terminal_id.uuid()));
                    }
                    let (from, to) = segment_edge(connect.span_segment_id, connect.terminal_id, connect.end);
                    if !self.graph.can_link(from, to) {
                        return Err(ProjectionError::GraphConflict(format!(
                            "terminal {} already linked in that direction",
                            connect.terminal_id
                        )));
                    }
                }
                Ok(vec![*route_node_id])
            }
            SpanEquipmentEvent::SegmentDisconnectedFromTerminal {
                route_node_id,
                span_segment_id,
                terminal_id,
                ..
            } => {
                let (s, t) = (span_segment_id.uuid(), terminal_id.uuid());
                if self.graph.edge(s, t).is_none() && self.graph.edge(t, s).is_none() {
                    return Err(ProjectionError::GraphConflict(format!(
                        "segment {span_segment_id} is not linked to terminal {terminal_id}"
                    )));
                }
                Ok(vec![*route_node_id])
            }
        }
    }

    fn check_container(&self, event: &NodeContainerEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        if let NodeContainerEvent::PlacedInRouteNetwork { container } = event {
            self.ensure_fresh(container.id.uuid())?;
            if self.interests.contains_key(&container.interest_id) {
                return Err(ProjectionError::DuplicateElement(container.interest_id.uuid()));
            }
            if self.container_by_route_node.contains_key(&container.route_node_id) {
                return Err(ProjectionError::RouteNodeOccupied {
                    route_node_id: container.route_node_id,
                });
            }
            return Ok(vec![container.route_node_id]);
        }

        let id = event.node_container_id();
        let container = self
            .try_get_equipment::<NodeContainer>(id)
            .ok_or(ProjectionError::UnknownElement(id.uuid()))?;

        match event {
            NodeContainerEvent::RackAdded { rack, .. } => self.ensure_fresh(rack.id.uuid())?,
            NodeContainerEvent::TerminalEquipmentAdded {
                terminal_equipment_id, ..
            } => self.ensure_terminal_equipment(*terminal_equipment_id)?,
            NodeContainerEvent::TerminalEquipmentAddedToRack { rack_id, mount, .. } => {
                if container.rack(*rack_id).is_none() {
                    return Err(ProjectionError::UnknownElement(rack_id.uuid()));
                }
                self.ensure_terminal_equipment(mount.terminal_equipment_id)?;
            }
            NodeContainerEvent::RackPropertiesUpdated { rack_id, .. }
            | NodeContainerEvent::TerminalEquipmentMovedInRack { rack_id, .. } => {
                if container.rack(*rack_id).is_none() {
                    return Err(ProjectionError::UnknownElement(rack_id.uuid()));
                }
            }
            _ => {}
        }
        Ok(vec![container.route_node_id])
    }

    fn check_terminal_equipment(&self, event: &TerminalEquipmentEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        if let TerminalEquipmentEvent::Placed {
            equipment,
            route_node_id,
        } = event
        {
            self.ensure_fresh(equipment.id.uuid())?;
            if self
                .try_get_equipment::<NodeContainer>(equipment.node_container_id)
                .is_none()
            {
                return Err(ProjectionError::UnknownElement(equipment.node_container_id.uuid()));
            }
            for structure in &equipment.terminal_structures {
                self.ensure_fresh(structure.id.uuid())?;
                for terminal in &structure.terminals {
                    self.ensure_fresh(terminal.id.uuid())?;
                }
            }
            return Ok(vec![*route_node_id]);
        }

        let id = event.terminal_equipment_id();
        let equipment = self
            .try_get_equipment::<TerminalEquipment>(id)
            .ok_or(ProjectionError::UnknownElement(id.uuid()))?;
        Ok(self.route_node_of(equipment).into_iter().collect())
    }

    fn check_connectivity(&self, event: &ConnectivityEvent) -> Result<Vec<RouteElementId>, ProjectionError> {
        match event {
            ConnectivityEvent::TerminalsConnected { connection } => {
                if self.connections.contains_key(&connection.id) {
                    return Err(ProjectionError::DuplicateElement(connection.id.uuid()));
                }
                for terminal in [connection.from_terminal_id, connection.to_terminal_id] {
                    if self.terminal(terminal).is_none() {
                        return Err(ProjectionError::UnknownElement(terminal.uuid()));
                    }
                }
                if !self
                    .graph
                    .can_link(connection.from_terminal_id.uuid(), connection.to_terminal_id.uuid())
                {
                    return Err(ProjectionError::GraphConflict(format!(
                        "terminals {} -> {} cannot be linked",
                        connection.from_terminal_id, connection.to_terminal_id
                    )));
                }
                Ok(vec![connection.route_node_id])
            }
            ConnectivityEvent::TerminalsDisconnected { connection } => {
                if !self.connections.contains_key(&connection.id) {
                    return Err(ProjectionError::UnknownElement(connection.id.uuid()));
                }
                Ok(vec![connection.route_node_id])
            }
        }
    }

    fn ensure_fresh(&self, id: Uuid) -> Result<(), ProjectionError> {
        if self.elements.contains_key(&id) || self.equipment.contains_key(&id) {
            return Err(ProjectionError::DuplicateElement(id));
        }
        Ok(())
    }

    fn ensure_segment(&self, id: SpanSegmentId) -> Result<(), ProjectionError> {
        match self.elements.get(&id.uuid()) {
            Some(e) if e.is_span_segment() => Ok(()),
            _ => Err(ProjectionError::UnknownElement(id.uuid())),
        }
    }

    fn ensure_terminal_equipment(&self, id: TerminalEquipmentId) -> Result<(), ProjectionError> {
        self.try_get_equipment::<TerminalEquipment>(id)
            .map(|_| ())
            .ok_or(ProjectionError::UnknownElement(id.uuid()))
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    fn commit(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::Catalog(e) => self.commit_catalog(e),
            DomainEvent::SpanEquipment(e) => self.commit_span(e),
            DomainEvent::NodeContainer(e) => self.commit_container(e),
            DomainEvent::TerminalEquipment(e) => self.commit_terminal_equipment(e),
            DomainEvent::Connectivity(e) => self.commit_connectivity(e),
        }
    }

    fn commit_catalog(&mut self, event: &CatalogEvent) {
        self.catalog.apply(event);
    }

    fn commit_span(&mut self, event: &SpanEquipmentEvent) {
        let id = event.span_equipment_id();
        match event {
            SpanEquipmentEvent::PlacedInRouteNetwork { equipment, walk } => {
                self.interests.insert(
                    equipment.walk_of_interest_id,
                    RouteNetworkInterest::walk(equipment.walk_of_interest_id, walk),
                );
                self.index_route_elements(id, walk.elements(), true);
                self.elements.insert(id.uuid(), ElementRef::SpanEquipment(id));
                self.register_structures(id, &equipment.span_structures);
                self.names.set(id.uuid(), equipment.name());
                self.equipment.insert(id.uuid(), Equipment::Span(equipment.clone()));
                return;
            }
            SpanEquipmentEvent::NamingInfoChanged { naming, .. } => {
                self.names
                    .set(id.uuid(), naming.as_ref().and_then(|n| n.name.as_deref()));
            }
            SpanEquipmentEvent::AdditionalStructuresAdded { structures, .. } => {
                self.register_structures(id, structures);
            }
            SpanEquipmentEvent::Moved { old_walk, walk, .. }
            | SpanEquipmentEvent::WalkRecomputed { old_walk, walk, .. } => {
                self.replace_walk(id, old_walk, walk);
            }
            SpanEquipmentEvent::AffixedToParent { hop, walk, .. } => {
                self.related_cables.add(hop.parent_span_segment_id, id);
                if let Some(old) = self.span_walk(id) {
                    self.replace_walk(id, &old, walk);
                }
            }
            SpanEquipmentEvent::DetachedFromParent { hop, walk, .. } => {
                self.related_cables.remove(hop.parent_span_segment_id, id);
                if let Some(old) = self.span_walk(id) {
                    self.replace_walk(id, &old, walk);
                }
            }
            SpanEquipmentEvent::SegmentsConnectedToTerminals { connects, .. } => {
                for connect in connects {
                    let (from, to) = segment_edge(connect.span_segment_id, connect.terminal_id, connect.end);
                    self.graph.link(from, to, GraphEdge::SegmentEnd);
                }
            }
            SpanEquipmentEvent::SegmentDisconnectedFromTerminal {
                span_segment_id,
                terminal_id,
                ..
            } => {
                let (s, t) = (span_segment_id.uuid(), terminal_id.uuid());
                self.graph.unlink(s, t);
                self.graph.unlink(t, s);
            }
            SpanEquipmentEvent::ManufacturerChanged { .. }
            | SpanEquipmentEvent::AffixedToNodeContainer { .. }
            | SpanEquipmentEvent::DetachedFromNodeContainer { .. } => {}
        }

        if let Some(Equipment::Span(span)) = self.equipment.get_mut(&id.uuid()) {
            span.apply(event);
        }
    }

    fn commit_container(&mut self, event: &NodeContainerEvent) {
        let id = event.node_container_id();
        match event {
            NodeContainerEvent::PlacedInRouteNetwork { container } => {
                self.interests.insert(
                    container.interest_id,
                    RouteNetworkInterest::node(container.interest_id, container.route_node_id),
                );
                self.container_by_route_node.insert(container.route_node_id, id);
                self.elements.insert(id.uuid(), ElementRef::NodeContainer(id));
                for rack in &container.racks {
                    self.elements.insert(
                        rack.id.uuid(),
                        ElementRef::Rack {
                            node_container_id: id,
                            rack_id: rack.id,
                        },
                    );
                }
                self.equipment
                    .insert(id.uuid(), Equipment::NodeContainer(container.clone()));
                return;
            }
            NodeContainerEvent::RackAdded { rack, .. } => {
                self.elements.insert(
                    rack.id.uuid(),
                    ElementRef::Rack {
                        node_container_id: id,
                        rack_id: rack.id,
                    },
                );
            }
            _ => {}
        }

        if let Some(Equipment::NodeContainer(container)) = self.equipment.get_mut(&id.uuid()) {
            container.apply(event);
        }
    }

    fn commit_terminal_equipment(&mut self, event: &TerminalEquipmentEvent) {
        let id = event.terminal_equipment_id();
        match event {
            TerminalEquipmentEvent::Placed { equipment, .. } => {
                self.elements.insert(id.uuid(), ElementRef::TerminalEquipment(id));
                for structure in &equipment.terminal_structures {
                    self.elements.insert(
                        structure.id.uuid(),
                        ElementRef::TerminalStructure {
                            terminal_equipment_id: id,
                            terminal_structure_id: structure.id,
                        },
                    );
                    for terminal in &structure.terminals {
                        self.elements.insert(
                            terminal.id.uuid(),
                            ElementRef::Terminal {
                                terminal_equipment_id: id,
                                terminal_structure_id: structure.id,
                                terminal_id: terminal.id,
                            },
                        );
                        self.graph.add_node(terminal.id.uuid());
                    }
                    for input in structure
                        .terminals
                        .iter()
                        .filter(|t| t.direction == TerminalDirection::In)
                    {
                        for output in structure.internal_counterparts(input) {
                            self.graph
                                .link(input.id.uuid(), output.id.uuid(), GraphEdge::Internal);
                        }
                    }
                }
                self.names.set(id.uuid(), equipment.name());
                self.equipment.insert(id.uuid(), Equipment::Terminal(equipment.clone()));
                return;
            }
            TerminalEquipmentEvent::NamingInfoChanged { naming, .. } => {
                self.names
                    .set(id.uuid(), naming.as_ref().and_then(|n| n.name.as_deref()));
            }
            TerminalEquipmentEvent::ManufacturerChanged { .. } => {}
        }

        if let Some(Equipment::Terminal(equipment)) = self.equipment.get_mut(&id.uuid()) {
            equipment.apply(event);
        }
    }

    fn commit_connectivity(&mut self, event: &ConnectivityEvent) {
        match event {
            ConnectivityEvent::TerminalsConnected { connection } => {
                self.graph.link(
                    connection.from_terminal_id.uuid(),
                    connection.to_terminal_id.uuid(),
                    GraphEdge::Patch {
                        fiber_length_m: connection.fiber_length_m,
                    },
                );
                self.connections.insert(connection.id, connection.clone());
            }
            ConnectivityEvent::TerminalsDisconnected { connection } => {
                if let Some(stored) = self.connections.remove(&connection.id) {
                    self.graph
                        .unlink(stored.from_terminal_id.uuid(), stored.to_terminal_id.uuid());
                }
            }
        }
    }

    fn register_structures(&mut self, id: SpanEquipmentId, structures: &[SpanStructure]) {
        for structure in structures {
            self.elements.insert(
                structure.id.uuid(),
                ElementRef::SpanStructure {
                    span_equipment_id: id,
                    span_structure_id: structure.id,
                },
            );
            for segment in &structure.span_segments {
                self.elements.insert(
                    segment.id.uuid(),
                    ElementRef::SpanSegment {
                        span_equipment_id: id,
                        span_structure_id: structure.id,
                        span_segment_id: segment.id,
                    },
                );
                self.graph.add_node(segment.id.uuid());
            }
        }
    }

    fn replace_walk(&mut self, id: SpanEquipmentId, old: &WalkOfInterest, new: &WalkOfInterest) {
        let Some(interest_id) = self
            .try_get_equipment::<SpanEquipment>(id)
            .map(|s| s.walk_of_interest_id)
        else {
            return;
        };
        self.index_route_elements(id, old.elements(), false);
        self.index_route_elements(id, new.elements(), true);
        self.interests
            .insert(interest_id, RouteNetworkInterest::walk(interest_id, new));
    }

    fn index_route_elements(&mut self, id: SpanEquipmentId, elements: &[RouteElementId], add: bool) {
        for element in elements {
            if add {
                self.span_equipment_by_route_element
                    .entry(*element)
                    .or_default()
                    .insert(id);
            } else if let Some(ids) = self.span_equipment_by_route_element.get_mut(element) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.span_equipment_by_route_element.remove(element);
                }
            }
        }
    }
}

/// Edge direction for a segment end: `From` leaves the terminal, `To` enters it
fn segment_edge(segment: SpanSegmentId, terminal: TerminalId, end: SpanSegmentEnd) -> (Uuid, Uuid) {
    match end {
        SpanSegmentEnd::From => (terminal.uuid(), segment.uuid()),
        SpanSegmentEnd::To => (segment.uuid(), terminal.uuid()),
    }
}

fn union(a: &WalkOfInterest, b: &WalkOfInterest) -> Vec<RouteElementId> {
    let mut out: Vec<RouteElementId> = a.elements().to_vec();
    for e in b.elements() {
        if !out.contains(e) {
            out.push(*e);
        }
    }
    out
}
