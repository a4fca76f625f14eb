//! Outage view builder
//!
//! Builds the tree of everything downstream of a route node or a piece of
//! equipment in it. Containers, racks and terminal equipment are always
//! listed; terminals without downstream connectivity and structures left
//! without terminals are pruned. Customer terminations become installation
//! leaves and every other node reports how many installations it feeds.

use crate::element::ElementRef;
use crate::error::TraceError;
use crate::graph::GraphEdge;
use crate::projection::UtilityGraphProjection;
use crate::trace::ordered_neighbors;
use fibernet_model::{
    NodeContainer, Rack, RouteNodeId, SpanEquipment, TerminalEquipment, TerminalStructure,
};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Default installation label
pub const DEFAULT_INSTALLATIONS_FOUND: &str = "installations found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageViewNode {
    pub id: Uuid,
    pub label: String,
    pub description: Option<String>,
    /// End customer connection
    pub installation: bool,
    pub nodes: Vec<OutageViewNode>,
}

impl OutageViewNode {
    fn new(id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            description: None,
            installation: false,
            nodes: Vec::new(),
        }
    }

    /// Installations at or below this node
    #[must_use]
    pub fn installation_count(&self) -> usize {
        usize::from(self.installation) + self.nodes.iter().map(Self::installation_count).sum::<usize>()
    }

    /// Nodes in this subtree including itself
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.nodes.iter().map(Self::node_count).sum::<usize>()
    }

    /// Depth-first search by id
    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<&OutageViewNode> {
        if self.id == id {
            return Some(self);
        }
        self.nodes.iter().find_map(|n| n.find(id))
    }

    fn describe(&mut self, installations_found: &str) -> usize {
        if self.installation {
            return 1;
        }
        let count = self
            .nodes
            .iter_mut()
            .map(|n| n.describe(installations_found))
            .sum();
        self.description = Some(format!("{count} {installations_found}"));
        count
    }
}

pub struct OutageViewBuilder<'a> {
    projection: &'a UtilityGraphProjection,
    installations_found: &'a str,
}

impl<'a> OutageViewBuilder<'a> {
    #[must_use]
    pub fn new(projection: &'a UtilityGraphProjection, installations_found: &'a str) -> Self {
        Self {
            projection,
            installations_found,
        }
    }

    /// Build the outage tree for a route node, or for one element in it
    ///
    /// The root may be the node container, a rack, terminal equipment, a
    /// terminal structure, a terminal or span equipment (or one of its
    /// structures or segments).
    ///
    /// # Errors
    /// No container at the node, unknown root, root not at the node, or a
    /// cycle in the connectivity graph
    pub fn build(&self, route_node_id: RouteNodeId, root: Option<Uuid>) -> Result<OutageViewNode, TraceError> {
        let mut path = HashSet::new();
        let mut tree = match root {
            None => {
                let container = self
                    .projection
                    .node_container_at(route_node_id)
                    .ok_or(TraceError::NoContainerAtRouteNode(route_node_id))?;
                self.container_node(container, &mut path)?
            }
            Some(id) => self.root_node(route_node_id, id, &mut path)?,
        };
        let installations = tree.describe(self.installations_found);
        debug!(
            route_node = %route_node_id,
            nodes = tree.node_count(),
            installations,
            "outage view built"
        );
        Ok(tree)
    }

    fn root_node(&self, route_node_id: RouteNodeId, id: Uuid, path: &mut HashSet<Uuid>) -> Result<OutageViewNode, TraceError> {
        let element = self.projection.element(id).ok_or(TraceError::ElementNotFound(id))?;
        let not_here = || TraceError::NotAtRouteNode {
            equipment_id: element.equipment_id(),
            route_node_id,
        };

        match element {
            ElementRef::NodeContainer(container_id) | ElementRef::Rack { node_container_id: container_id, .. } => {
                let container = self
                    .projection
                    .try_get_equipment::<NodeContainer>(container_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                if container.route_node_id != route_node_id {
                    return Err(not_here());
                }
                match element {
                    ElementRef::Rack { rack_id, .. } => {
                        let rack = container.rack(rack_id).ok_or(TraceError::DanglingReference(id))?;
                        self.rack_node(container, rack, path)
                    }
                    _ => self.container_node(container, path),
                }
            }
            ElementRef::TerminalEquipment(equipment_id)
            | ElementRef::TerminalStructure {
                terminal_equipment_id: equipment_id,
                ..
            }
            | ElementRef::Terminal {
                terminal_equipment_id: equipment_id,
                ..
            } => {
                let equipment = self
                    .projection
                    .try_get_equipment::<TerminalEquipment>(equipment_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                if self.projection.route_node_of(equipment) != Some(route_node_id) {
                    return Err(not_here());
                }
                match element {
                    ElementRef::TerminalStructure { terminal_structure_id, .. } => {
                        let structure = equipment
                            .structure(terminal_structure_id)
                            .ok_or(TraceError::DanglingReference(id))?;
                        Ok(self
                            .structure_node(structure, path)?
                            .unwrap_or_else(|| self.structure_label(structure)))
                    }
                    ElementRef::Terminal { .. } => {
                        let mut node = OutageViewNode::new(id, self.terminal_label(id));
                        node.nodes = self.downstream(id, path)?;
                        Ok(node)
                    }
                    _ => self.equipment_node(equipment, path),
                }
            }
            ElementRef::SpanEquipment(span_id)
            | ElementRef::SpanStructure {
                span_equipment_id: span_id,
                ..
            }
            | ElementRef::SpanSegment {
                span_equipment_id: span_id,
                ..
            } => {
                let span = self
                    .projection
                    .try_get_equipment::<SpanEquipment>(span_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                let at_node = self
                    .projection
                    .walk_of(span)
                    .is_some_and(|w| w.node_position(route_node_id).is_some());
                if !at_node {
                    return Err(not_here());
                }
                let mut node = OutageViewNode::new(span.id.uuid(), span_label(span));
                for (_, segment) in span.segments() {
                    let segment_id = segment.id.uuid();
                    if !path.insert(segment_id) {
                        return Err(TraceError::CycleDetected(segment_id));
                    }
                    node.nodes.extend(self.downstream(segment_id, path)?);
                    path.remove(&segment_id);
                }
                Ok(node)
            }
        }
    }

    fn container_node(&self, container: &NodeContainer, path: &mut HashSet<Uuid>) -> Result<OutageViewNode, TraceError> {
        let label = self
            .projection
            .catalog()
            .node_container_specification(container.specification_id)
            .map_or_else(|| "Node container".to_string(), |s| s.name.clone());
        let mut node = OutageViewNode::new(container.id.uuid(), label);

        let mut racks: Vec<&Rack> = container.racks.iter().collect();
        racks.sort_by_key(|r| r.position);
        for rack in racks {
            node.nodes.push(self.rack_node(container, rack, path)?);
        }
        for equipment_id in &container.terminal_equipment_references {
            let equipment = self
                .projection
                .try_get_equipment::<TerminalEquipment>(*equipment_id)
                .ok_or(TraceError::DanglingReference(equipment_id.uuid()))?;
            node.nodes.push(self.equipment_node(equipment, path)?);
        }
        Ok(node)
    }

    fn rack_node(&self, container: &NodeContainer, rack: &Rack, path: &mut HashSet<Uuid>) -> Result<OutageViewNode, TraceError> {
        let mut node = OutageViewNode::new(rack.id.uuid(), rack.name.clone());
        for mount in rack.ordered_mounts(container.vertical_content_alignment) {
            let equipment = self
                .projection
                .try_get_equipment::<TerminalEquipment>(mount.terminal_equipment_id)
                .ok_or(TraceError::DanglingReference(mount.terminal_equipment_id.uuid()))?;
            node.nodes.push(self.equipment_node(equipment, path)?);
        }
        Ok(node)
    }

    fn equipment_node(&self, equipment: &TerminalEquipment, path: &mut HashSet<Uuid>) -> Result<OutageViewNode, TraceError> {
        let mut node = OutageViewNode::new(equipment.id.uuid(), self.equipment_label(equipment));
        if self.is_installation(equipment) {
            node.installation = true;
            return Ok(node);
        }
        let mut structures: Vec<&TerminalStructure> = equipment.terminal_structures.iter().collect();
        structures.sort_by_key(|s| s.position);
        for structure in structures {
            if let Some(child) = self.structure_node(structure, path)? {
                node.nodes.push(child);
            }
        }
        Ok(node)
    }

    /// `None` when no terminal of the structure carries signal onwards
    fn structure_node(
        &self,
        structure: &TerminalStructure,
        path: &mut HashSet<Uuid>,
    ) -> Result<Option<OutageViewNode>, TraceError> {
        let mut node = self.structure_label(structure);
        let graph = self.projection.graph();
        // outputs fed by a structure input are listed under that input
        let entries = structure.terminals.iter().filter(|t| {
            !graph
                .neighbors(t.id.uuid(), Direction::Incoming)
                .iter()
                .any(|(_, e)| *e == GraphEdge::Internal)
        });
        for terminal in entries {
            if let Some(child) = self.terminal_node(terminal.id.uuid(), path)? {
                node.nodes.push(child);
            }
        }
        Ok((!node.nodes.is_empty()).then_some(node))
    }

    /// `None` for a terminal with nothing downstream
    fn terminal_node(&self, id: Uuid, path: &mut HashSet<Uuid>) -> Result<Option<OutageViewNode>, TraceError> {
        if self.projection.graph().neighbors(id, Direction::Outgoing).is_empty() {
            return Ok(None);
        }
        if !path.insert(id) {
            return Err(TraceError::CycleDetected(id));
        }
        let mut node = OutageViewNode::new(id, self.terminal_label(id));
        node.nodes = self.downstream(id, path)?;
        path.remove(&id);
        Ok(Some(node))
    }

    fn downstream(&self, from: Uuid, path: &mut HashSet<Uuid>) -> Result<Vec<OutageViewNode>, TraceError> {
        let mut nodes = Vec::new();
        for (next, edge) in ordered_neighbors(self.projection, from, Direction::Outgoing)? {
            if let Some(node) = self.visit(next, edge, path)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn visit(&self, id: Uuid, edge: GraphEdge, path: &mut HashSet<Uuid>) -> Result<Option<OutageViewNode>, TraceError> {
        match self.projection.element(id) {
            Some(ElementRef::SpanSegment { span_equipment_id, .. }) => {
                let span = self
                    .projection
                    .try_get_equipment::<SpanEquipment>(span_equipment_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                if !path.insert(id) {
                    return Err(TraceError::CycleDetected(id));
                }
                let mut node = OutageViewNode::new(id, span_label(span));
                node.nodes = self.downstream(id, path)?;
                path.remove(&id);
                Ok(Some(node))
            }
            Some(ElementRef::Terminal { terminal_id, .. }) => {
                if edge == GraphEdge::Internal {
                    return self.terminal_node(id, path);
                }
                let (equipment, _, _) = self
                    .projection
                    .terminal(terminal_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                let mut node = OutageViewNode::new(equipment.id.uuid(), self.equipment_label(equipment));
                if self.is_installation(equipment) {
                    node.installation = true;
                } else if let Some(child) = self.terminal_node(id, path)? {
                    node.nodes.push(child);
                }
                Ok(Some(node))
            }
            Some(_) | None => Err(TraceError::DanglingReference(id)),
        }
    }

    fn is_installation(&self, equipment: &TerminalEquipment) -> bool {
        self.projection
            .catalog()
            .terminal_equipment_specification(equipment.specification_id)
            .is_some_and(|s| s.is_customer_termination)
    }

    fn equipment_label(&self, equipment: &TerminalEquipment) -> String {
        equipment
            .naming
            .as_ref()
            .and_then(|n| n.name.clone())
            .or_else(|| {
                self.projection
                    .catalog()
                    .terminal_equipment_specification(equipment.specification_id)
                    .map(|s| s.name.clone())
            })
            .unwrap_or_else(|| equipment.id.to_string())
    }

    fn structure_label(&self, structure: &TerminalStructure) -> OutageViewNode {
        let name = self
            .projection
            .catalog()
            .terminal_structure_specification(structure.specification_id)
            .map_or("", |s| s.short_name.as_str());
        OutageViewNode::new(structure.id.uuid(), format!("{} {name}", structure.position).trim_end().to_string())
    }

    fn terminal_label(&self, id: Uuid) -> String {
        match self.projection.element(id) {
            Some(ElementRef::Terminal { terminal_id, .. }) => self
                .projection
                .terminal(terminal_id)
                .map_or_else(|| id.to_string(), |(_, _, t)| t.name.clone()),
            _ => id.to_string(),
        }
    }
}

fn span_label(span: &SpanEquipment) -> String {
    span.naming
        .as_ref()
        .and_then(|n| n.name.clone())
        .unwrap_or_else(|| span.id.to_string())
}
