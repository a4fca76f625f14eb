//! Shared fixtures for fibernet integration tests
//!
//! [`TestNetwork`] wires a service to an in-memory route network and
//! notifier, seeds a small catalog through the catalog commands and offers
//! helpers that place equipment the same way a client would.

#![allow(missing_docs)]

use fibernet_core::{
    ConnectSpanSegmentsWithTerminals, EventEnvelope, InMemoryNotifier, InMemoryRouteNetwork, PlaceNodeContainer,
    PlaceRackInNodeContainer, PlaceSpanEquipmentInRouteNetwork, PlaceTerminalEquipmentInNodeContainer, RackPlacement,
    ServiceConfig, UtilityNetworkService,
};
use fibernet_model::{
    DomainEvent, Manufacturer, ManufacturerId, NamingInfo, NodeContainerId, NodeContainerSpecification, RackId,
    RackPlacementMethod, RackSpecification, RouteElementId, RouteNodeId, SegmentTerminalConnect, SpanEquipment,
    SpanEquipmentId, SpanEquipmentSpecification, SpanSegmentEnd, SpanSegmentId, SpanStructureSpecification,
    SpanStructureTemplate, SpecificationId, TerminalDirection, TerminalEquipment, TerminalEquipmentEvent,
    TerminalEquipmentId, TerminalEquipmentSpecification, TerminalId, TerminalStructureSpecification,
    TerminalStructureTemplate, TerminalTemplate,
};
use std::sync::Arc;

/// Specification ids seeded by [`TestNetwork::new`]
#[derive(Debug, Clone, Copy)]
pub struct TestCatalog {
    pub manufacturer: ManufacturerId,
    pub jacket: SpecificationId,
    pub fiber: SpecificationId,
    pub duct: SpecificationId,
    /// Fixed cable, jacket plus two fibers
    pub cable_2f: SpecificationId,
    /// Conduit with two inner ducts, open for more
    pub conduit: SpecificationId,
    /// Conduit that refuses additional structures
    pub fixed_conduit: SpecificationId,
    pub well: SpecificationId,
    pub rack: SpecificationId,
    pub splitter_module: SpecificationId,
    pub splice_tray: SpecificationId,
    pub patch_module: SpecificationId,
    pub ont_port: SpecificationId,
    /// Rack mounted 1x4 splitter, 1U
    pub splitter: SpecificationId,
    /// Closure with one tray of four splices
    pub splice_closure: SpecificationId,
    /// Rack mounted panel with four bidirectional ports, 2U
    pub patch_panel: SpecificationId,
    /// Customer termination
    pub customer: SpecificationId,
}

impl TestCatalog {
    fn new() -> Self {
        Self {
            manufacturer: ManufacturerId::new(),
            jacket: SpecificationId::new(),
            fiber: SpecificationId::new(),
            duct: SpecificationId::new(),
            cable_2f: SpecificationId::new(),
            conduit: SpecificationId::new(),
            fixed_conduit: SpecificationId::new(),
            well: SpecificationId::new(),
            rack: SpecificationId::new(),
            splitter_module: SpecificationId::new(),
            splice_tray: SpecificationId::new(),
            patch_module: SpecificationId::new(),
            ont_port: SpecificationId::new(),
            splitter: SpecificationId::new(),
            splice_closure: SpecificationId::new(),
            patch_panel: SpecificationId::new(),
            customer: SpecificationId::new(),
        }
    }
}

pub fn span_structure_spec(id: SpecificationId, name: &str, color: &str) -> SpanStructureSpecification {
    SpanStructureSpecification {
        id,
        category: "Structure".to_string(),
        name: name.to_string(),
        color: color.to_string(),
        inner_diameter_mm: None,
        outer_diameter_mm: None,
        deprecated: false,
    }
}

pub fn structure_template(
    spec: SpecificationId,
    level: u8,
    position: u16,
    child_templates: Vec<SpanStructureTemplate>,
) -> SpanStructureTemplate {
    SpanStructureTemplate {
        span_structure_specification_id: spec,
        level,
        position,
        child_templates,
    }
}

pub fn terminal_structure_spec(
    id: SpecificationId,
    name: &str,
    terminal_templates: Vec<TerminalTemplate>,
) -> TerminalStructureSpecification {
    TerminalStructureSpecification {
        id,
        category: "Structure".to_string(),
        name: name.to_string(),
        short_name: name.to_string(),
        terminal_templates,
        deprecated: false,
    }
}

pub fn terminal_equipment_spec(
    id: SpecificationId,
    name: &str,
    structure: SpecificationId,
    rack_units: u16,
) -> TerminalEquipmentSpecification {
    TerminalEquipmentSpecification {
        id,
        category: "Equipment".to_string(),
        name: name.to_string(),
        short_name: name.to_string(),
        is_rack_equipment: rack_units > 0,
        height_in_rack_units: rack_units,
        is_customer_termination: false,
        manufacturer_refs: vec![],
        structure_templates: vec![TerminalStructureTemplate {
            terminal_structure_specification_id: structure,
            position: 1,
        }],
        deprecated: false,
    }
}

/// Service plus its collaborators, with a seeded catalog
pub struct TestNetwork {
    pub route_network: Arc<InMemoryRouteNetwork>,
    pub notifier: Arc<InMemoryNotifier>,
    pub service: UtilityNetworkService,
    pub catalog: TestCatalog,
}

impl TestNetwork {
    pub async fn new() -> Self {
        Self::with_config(ServiceConfig::default()).await
    }

    pub async fn with_config(config: ServiceConfig) -> Self {
        let route_network = Arc::new(InMemoryRouteNetwork::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let service = UtilityNetworkService::new(config, route_network.clone(), notifier.clone())
            .with_geometry(route_network.clone());
        let network = Self {
            route_network,
            notifier,
            service,
            catalog: TestCatalog::new(),
        };
        network.seed_catalog().await;
        network.notifier.take();
        network
    }

    async fn seed_catalog(&self) {
        let c = self.catalog;
        let s = &self.service;
        s.add_manufacturer(Manufacturer::new(c.manufacturer, "Acme Fiber"))
            .await
            .unwrap();
        for (id, name, color) in [(c.jacket, "Jacket", "Black"), (c.fiber, "Fiber", "Blue"), (c.duct, "Ø10 duct", "Red")] {
            s.add_span_structure_specification(span_structure_spec(id, name, color))
                .await
                .unwrap();
        }

        let specs = [
            SpanEquipmentSpecification {
                id: c.cable_2f,
                category: "Cable".to_string(),
                name: "2 fiber cable".to_string(),
                root_template: structure_template(
                    c.jacket,
                    1,
                    1,
                    vec![structure_template(c.fiber, 2, 1, vec![]), structure_template(c.fiber, 2, 2, vec![])],
                ),
                manufacturer_refs: vec![c.manufacturer],
                is_fixed: true,
                is_cable: true,
                deprecated: false,
            },
            SpanEquipmentSpecification {
                id: c.conduit,
                category: "Conduit".to_string(),
                name: "Ø40 2x10".to_string(),
                root_template: structure_template(
                    c.duct,
                    1,
                    1,
                    vec![structure_template(c.duct, 2, 1, vec![]), structure_template(c.duct, 2, 2, vec![])],
                ),
                manufacturer_refs: vec![],
                is_fixed: false,
                is_cable: false,
                deprecated: false,
            },
            SpanEquipmentSpecification {
                id: c.fixed_conduit,
                category: "Conduit".to_string(),
                name: "Ø12 fixed".to_string(),
                root_template: structure_template(c.duct, 1, 1, vec![]),
                manufacturer_refs: vec![],
                is_fixed: true,
                is_cable: false,
                deprecated: false,
            },
        ];
        for spec in specs {
            s.add_span_equipment_specification(spec).await.unwrap();
        }

        s.add_node_container_specification(NodeContainerSpecification {
            id: c.well,
            category: "Well".to_string(),
            name: "Well 1x2".to_string(),
            manufacturer_refs: vec![c.manufacturer],
            deprecated: false,
        })
        .await
        .unwrap();
        s.add_rack_specification(RackSpecification {
            id: c.rack,
            name: "Standard 19\"".to_string(),
            short_name: "19".to_string(),
            deprecated: false,
        })
        .await
        .unwrap();

        let mut splitter_terminals = vec![TerminalTemplate::new("in", TerminalDirection::In).internally_connected("s")];
        for i in 1..=4 {
            splitter_terminals
                .push(TerminalTemplate::new(format!("out{i}"), TerminalDirection::Out).internally_connected("s"));
        }
        let structures = [
            terminal_structure_spec(c.splitter_module, "PLC 1x4", splitter_terminals),
            terminal_structure_spec(
                c.splice_tray,
                "Tray 4",
                (1..=4)
                    .map(|i| TerminalTemplate::new(i.to_string(), TerminalDirection::Bi).splice())
                    .collect(),
            ),
            terminal_structure_spec(
                c.patch_module,
                "Module 4",
                (1..=4)
                    .map(|i| TerminalTemplate::new(i.to_string(), TerminalDirection::Bi).with_connector("SC/APC"))
                    .collect(),
            ),
            terminal_structure_spec(c.ont_port, "ONT", vec![TerminalTemplate::new("1", TerminalDirection::Bi)]),
        ];
        for spec in structures {
            s.add_terminal_structure_specification(spec).await.unwrap();
        }

        let mut customer = terminal_equipment_spec(c.customer, "Customer ONT", c.ont_port, 0);
        customer.is_customer_termination = true;
        for spec in [
            terminal_equipment_spec(c.splitter, "Splitter 1x4", c.splitter_module, 1),
            terminal_equipment_spec(c.splice_closure, "Closure", c.splice_tray, 0),
            terminal_equipment_spec(c.patch_panel, "Panel 4", c.patch_module, 2),
            customer,
        ] {
            s.add_terminal_equipment_specification(spec).await.unwrap();
        }
    }

    /// Straight line of `nodes` route nodes joined by 100 m segments
    ///
    /// Returns the alternating node/segment walk.
    pub fn line(&self, nodes: usize) -> Vec<RouteElementId> {
        assert!(nodes >= 2, "a line needs two nodes");
        let mut walk = vec![self.route_network.add_node()];
        for _ in 1..nodes {
            let from = *walk.last().unwrap();
            let to = self.route_network.add_node();
            walk.push(self.route_network.add_segment(from, to, 100.0).unwrap());
            walk.push(to);
        }
        walk
    }

    /// Join two existing nodes with a new segment
    pub fn segment(&self, from: RouteNodeId, to: RouteNodeId, length_m: f64) -> RouteElementId {
        self.route_network.add_segment(from, to, length_m).unwrap()
    }

    pub async fn place_container(&self, route_node_id: RouteNodeId) -> NodeContainerId {
        let interest_id = self.route_network.register_node_interest(route_node_id).unwrap();
        let id = NodeContainerId::new();
        self.service
            .place_node_container(PlaceNodeContainer {
                node_container_id: id,
                interest_id,
                specification_id: self.catalog.well,
                manufacturer_id: None,
            })
            .await
            .unwrap();
        id
    }

    pub async fn place_rack(&self, container: NodeContainerId, name: &str, height: u16) -> RackId {
        let rack_id = RackId::new();
        self.service
            .place_rack(PlaceRackInNodeContainer {
                node_container_id: container,
                rack_id,
                specification_id: self.catalog.rack,
                name: name.to_string(),
                height_in_units: height,
            })
            .await
            .unwrap();
        rack_id
    }

    /// Place one terminal equipment, in a rack when `rack` names one and a
    /// start unit
    pub async fn place_terminal_equipment(
        &self,
        container: NodeContainerId,
        specification_id: SpecificationId,
        name: &str,
        rack: Option<(RackId, u16)>,
    ) -> TerminalEquipmentId {
        let envelopes = self
            .service
            .place_terminal_equipment(PlaceTerminalEquipmentInNodeContainer {
                node_container_id: container,
                specification_id,
                manufacturer_id: None,
                naming: Some(NamingInfo::named(name)),
                count: 1,
                start_sequence_number: 1,
                rack_placement: rack.map(|(rack_id, start_unit)| RackPlacement {
                    rack_id,
                    start_unit,
                    method: RackPlacementMethod::BottomUp,
                }),
            })
            .await
            .unwrap();
        placed_terminal_equipment(&envelopes)[0]
    }

    pub async fn place_span(
        &self,
        specification_id: SpecificationId,
        name: &str,
        walk: &[RouteElementId],
    ) -> SpanEquipmentId {
        let id = SpanEquipmentId::new();
        self.service
            .place_span_equipment(PlaceSpanEquipmentInRouteNetwork {
                span_equipment_id: id,
                specification_id,
                walk: walk.to_vec(),
                manufacturer_id: None,
                naming: Some(NamingInfo::named(name)),
            })
            .await
            .unwrap();
        id
    }

    pub async fn place_cable(&self, name: &str, walk: &[RouteElementId]) -> SpanEquipmentId {
        self.place_span(self.catalog.cable_2f, name, walk).await
    }

    pub fn span(&self, id: SpanEquipmentId) -> SpanEquipment {
        self.service
            .read(|p| p.try_get_equipment::<SpanEquipment>(id).cloned())
            .unwrap()
    }

    pub fn terminal_equipment(&self, id: TerminalEquipmentId) -> TerminalEquipment {
        self.service
            .read(|p| p.try_get_equipment::<TerminalEquipment>(id).cloned())
            .unwrap()
    }

    /// Segment of the inner structure at `position`, or of the outer
    /// structure for position 0
    pub fn segment_of(&self, span: SpanEquipmentId, position: u16) -> SpanSegmentId {
        let level = if position == 0 { 1 } else { 2 };
        let position = position.max(1);
        self.span(span)
            .segments()
            .find(|(s, _)| s.level == level && s.position == position)
            .map(|(_, seg)| seg.id)
            .unwrap()
    }

    pub fn terminal_named(&self, equipment: TerminalEquipmentId, name: &str) -> TerminalId {
        self.terminal_equipment(equipment)
            .terminals()
            .find(|(_, t)| t.name == name)
            .map(|(_, t)| t.id)
            .unwrap()
    }

    /// Terminate one segment end on a terminal
    pub async fn connect(
        &self,
        route_node_id: RouteNodeId,
        span_segment_id: SpanSegmentId,
        terminal_id: TerminalId,
        end: SpanSegmentEnd,
    ) {
        self.service
            .connect_span_segments_with_terminals(ConnectSpanSegmentsWithTerminals {
                route_node_id,
                connects: vec![SegmentTerminalConnect {
                    span_segment_id,
                    terminal_id,
                    end,
                }],
            })
            .await
            .unwrap();
    }
}

/// Ids of terminal equipment placed by a batch, in order
pub fn placed_terminal_equipment(envelopes: &[EventEnvelope]) -> Vec<TerminalEquipmentId> {
    envelopes
        .iter()
        .filter_map(|e| match &e.event {
            DomainEvent::TerminalEquipment(TerminalEquipmentEvent::Placed { equipment, .. }) => Some(equipment.id),
            _ => None,
        })
        .collect()
}

/// Splitter network used by the connectivity tests
///
/// ```text
///  upstream --feeder--> central [rack: splitter A, splitter B]
///  splitter A out1 --drop 1--> customer 1
///  splitter A out2 --drop 2--> customer 2
///  splitter B out1 --drop 3--> customer 3
/// ```
pub struct SplitterNetwork {
    pub net: TestNetwork,
    pub central: RouteNodeId,
    pub central_container: NodeContainerId,
    pub rack: RackId,
    pub splitter_a: TerminalEquipmentId,
    pub splitter_b: TerminalEquipmentId,
    pub feeder: SpanEquipmentId,
    pub drops: Vec<SpanEquipmentId>,
    pub customer_nodes: Vec<RouteNodeId>,
    pub customers: Vec<TerminalEquipmentId>,
}

impl SplitterNetwork {
    pub async fn new() -> Self {
        Self::build(TestNetwork::new().await).await
    }

    pub async fn build(net: TestNetwork) -> Self {
        let feeder_walk = net.line(2);
        let central = feeder_walk[2];
        let central_container = net.place_container(central).await;
        let rack = net.place_rack(central_container, "Rack 1", 42).await;
        let splitter_a = net
            .place_terminal_equipment(central_container, net.catalog.splitter, "Splitter A", Some((rack, 1)))
            .await;
        let splitter_b = net
            .place_terminal_equipment(central_container, net.catalog.splitter, "Splitter B", Some((rack, 2)))
            .await;

        let feeder = net.place_cable("Feeder", &feeder_walk).await;
        net.connect(
            central,
            net.segment_of(feeder, 1),
            net.terminal_named(splitter_a, "in"),
            SpanSegmentEnd::To,
        )
        .await;

        let mut drops = Vec::new();
        let mut customer_nodes = Vec::new();
        let mut customers = Vec::new();
        for (i, (splitter, output)) in [(splitter_a, "out1"), (splitter_a, "out2"), (splitter_b, "out1")]
            .into_iter()
            .enumerate()
        {
            let far = net.route_network.add_node();
            let walk = vec![central, net.segment(central, far, 50.0), far];
            let container = net.place_container(far).await;
            let customer = net
                .place_terminal_equipment(container, net.catalog.customer, &format!("Customer {}", i + 1), None)
                .await;

            let drop = net.place_cable(&format!("Drop {}", i + 1), &walk).await;
            let fiber = net.segment_of(drop, 1);
            net.connect(central, fiber, net.terminal_named(splitter, output), SpanSegmentEnd::From)
                .await;
            net.connect(far, fiber, net.terminal_named(customer, "1"), SpanSegmentEnd::To)
                .await;

            drops.push(drop);
            customer_nodes.push(far);
            customers.push(customer);
        }
        net.notifier.take();

        Self {
            net,
            central,
            central_container,
            rack,
            splitter_a,
            splitter_b,
            feeder,
            drops,
            customer_nodes,
            customers,
        }
    }
}
