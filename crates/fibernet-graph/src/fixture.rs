//! Small splitter network for unit tests
//!
//! ```text
//!             rack in central node
//!  feeder -> [splitter A] out1 -> drop 1 -> customer 1
//!                         out2 -> drop 2 -> customer 2
//!                         out3 -> drop 3 (unterminated)
//!                         out4    (free)
//!            [splitter B] out1 -> drop 4 -> customer 3
//! ```

use crate::projection::UtilityGraphProjection;
use fibernet_model::{
    CatalogEvent, DomainEvent, InterestId, NamingInfo, NodeContainer, NodeContainerEvent,
    NodeContainerId, RackId, RouteElementId, RouteNodeId, SegmentTerminalConnect, SpanEquipment,
    SpanEquipmentEvent, SpanEquipmentId, SpanEquipmentSpecification, SpanSegmentEnd, SpanSegmentId,
    SpanStructureTemplate, SpecificationId, SubrackMount, TerminalDirection, TerminalEquipment,
    TerminalEquipmentEvent, TerminalEquipmentId, TerminalEquipmentSpecification, TerminalId,
    TerminalStructureSpecification, TerminalStructureTemplate, TerminalTemplate, WalkOfInterest,
};

pub(crate) struct Fixture {
    pub(crate) projection: UtilityGraphProjection,
    pub(crate) central: RouteNodeId,
    pub(crate) rack: RackId,
    pub(crate) splitter_a: TerminalEquipmentId,
    pub(crate) splitter_b: TerminalEquipmentId,
    pub(crate) feeder: SpanEquipmentId,
    pub(crate) drops: Vec<SpanEquipmentId>,
    pub(crate) customers: Vec<TerminalEquipmentId>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let mut projection = UtilityGraphProjection::new();
        let apply = |p: &mut UtilityGraphProjection, e: DomainEvent| {
            p.apply(&e).unwrap();
        };

        let splitter_structure = SpecificationId::new();
        let customer_structure = SpecificationId::new();
        let splitter_spec = TerminalEquipmentSpecification {
            id: SpecificationId::new(),
            category: "Splitters".to_string(),
            name: "Splitter 1x4".to_string(),
            short_name: "1x4".to_string(),
            is_rack_equipment: true,
            height_in_rack_units: 1,
            is_customer_termination: false,
            manufacturer_refs: vec![],
            structure_templates: vec![TerminalStructureTemplate {
                terminal_structure_specification_id: splitter_structure,
                position: 1,
            }],
            deprecated: false,
        };
        let customer_spec = TerminalEquipmentSpecification {
            id: SpecificationId::new(),
            category: "Customer".to_string(),
            name: "Customer termination".to_string(),
            short_name: "CT".to_string(),
            is_rack_equipment: false,
            height_in_rack_units: 0,
            is_customer_termination: true,
            manufacturer_refs: vec![],
            structure_templates: vec![TerminalStructureTemplate {
                terminal_structure_specification_id: customer_structure,
                position: 1,
            }],
            deprecated: false,
        };

        let mut splitter_terminals = vec![TerminalTemplate::new("in", TerminalDirection::In).internally_connected("s")];
        for i in 1..=4 {
            splitter_terminals
                .push(TerminalTemplate::new(format!("out{i}"), TerminalDirection::Out).internally_connected("s"));
        }
        for event in [
            CatalogEvent::TerminalStructureSpecificationAdded(TerminalStructureSpecification {
                id: splitter_structure,
                category: "Splitters".to_string(),
                name: "PLC 1x4".to_string(),
                short_name: "1x4".to_string(),
                terminal_templates: splitter_terminals,
                deprecated: false,
            }),
            CatalogEvent::TerminalStructureSpecificationAdded(TerminalStructureSpecification {
                id: customer_structure,
                category: "Customer".to_string(),
                name: "ONT port".to_string(),
                short_name: "ONT".to_string(),
                terminal_templates: vec![TerminalTemplate::new("1", TerminalDirection::Bi)],
                deprecated: false,
            }),
            CatalogEvent::TerminalEquipmentSpecificationAdded(splitter_spec.clone()),
            CatalogEvent::TerminalEquipmentSpecificationAdded(customer_spec.clone()),
        ] {
            apply(&mut projection, event.into());
        }

        let central = RouteElementId::new();
        let container = place_container(&mut projection, central);
        let rack = RackId::new();
        let event = projection
            .try_get_equipment::<NodeContainer>(container)
            .unwrap()
            .add_rack(rack, SpecificationId::new(), "Rack 1", 42)
            .unwrap();
        apply(&mut projection, event.into());

        let mut splitters = Vec::new();
        for (position, name) in [(1, "Splitter A"), (2, "Splitter B")] {
            let id = place_terminal_equipment(&mut projection, &splitter_spec, container, central, name);
            apply(
                &mut projection,
                NodeContainerEvent::TerminalEquipmentAddedToRack {
                    id: container,
                    rack_id: rack,
                    mount: SubrackMount {
                        terminal_equipment_id: id,
                        position,
                        height_in_units: 1,
                    },
                }
                .into(),
            );
            splitters.push(id);
        }

        let mut customers = Vec::new();
        let mut customer_nodes = Vec::new();
        for i in 1..=3 {
            let node = RouteElementId::new();
            let container = place_container(&mut projection, node);
            let id = place_terminal_equipment(&mut projection, &customer_spec, container, node, &format!("Customer {i}"));
            apply(
                &mut projection,
                NodeContainerEvent::TerminalEquipmentAdded {
                    id: container,
                    terminal_equipment_id: id,
                }
                .into(),
            );
            customers.push(id);
            customer_nodes.push(node);
        }

        let mut fixture = Self {
            projection,
            central,
            rack,
            splitter_a: splitters[0],
            splitter_b: splitters[1],
            feeder: SpanEquipmentId::new(),
            drops: Vec::new(),
            customers,
        };

        let upstream = RouteElementId::new();
        fixture.feeder = fixture.place_cable("Feeder", &[upstream, RouteElementId::new(), central]);
        let feeder_segment = fixture.segment(fixture.feeder);
        let input = fixture.terminal_named(fixture.splitter_a, "in");
        fixture.connect(fixture.feeder, central, feeder_segment, input, SpanSegmentEnd::To);

        let links = [
            (fixture.splitter_a, "out1", Some(0)),
            (fixture.splitter_a, "out2", Some(1)),
            (fixture.splitter_a, "out3", None),
            (fixture.splitter_b, "out1", Some(2)),
        ];
        for (i, (splitter, output, customer)) in links.into_iter().enumerate() {
            let far = customer.map_or_else(RouteElementId::new, |c| customer_nodes[c]);
            let drop = fixture.place_cable(&format!("Drop {}", i + 1), &[central, RouteElementId::new(), far]);
            let segment = fixture.segment(drop);
            let terminal = fixture.terminal_named(splitter, output);
            fixture.connect(drop, central, segment, terminal, SpanSegmentEnd::From);
            if let Some(c) = customer {
                let terminal = fixture.terminal_named(fixture.customers[c], "1");
                fixture.connect(drop, far, segment, terminal, SpanSegmentEnd::To);
            }
            fixture.drops.push(drop);
        }

        fixture
    }

    pub(crate) fn terminal_named(&self, equipment: TerminalEquipmentId, name: &str) -> TerminalId {
        self.projection
            .try_get_equipment::<TerminalEquipment>(equipment)
            .unwrap()
            .terminals()
            .find(|(_, t)| t.name == name)
            .map(|(_, t)| t.id)
            .unwrap()
    }

    pub(crate) fn segment(&self, span: SpanEquipmentId) -> SpanSegmentId {
        self.projection
            .try_get_equipment::<SpanEquipment>(span)
            .unwrap()
            .segments()
            .next()
            .unwrap()
            .1
            .id
    }

    fn place_cable(&mut self, name: &str, walk: &[RouteElementId]) -> SpanEquipmentId {
        let spec = SpanEquipmentSpecification {
            id: SpecificationId::new(),
            category: "Cable".to_string(),
            name: "1 fiber".to_string(),
            root_template: SpanStructureTemplate {
                span_structure_specification_id: SpecificationId::new(),
                level: 1,
                position: 1,
                child_templates: vec![],
            },
            manufacturer_refs: vec![],
            is_fixed: true,
            is_cable: true,
            deprecated: false,
        };
        let equipment = SpanEquipment::place(
            SpanEquipmentId::new(),
            &spec,
            InterestId::new(),
            None,
            Some(NamingInfo::named(name)),
        )
        .unwrap();
        let id = equipment.id;
        self.projection
            .apply(
                &SpanEquipmentEvent::PlacedInRouteNetwork {
                    equipment,
                    walk: WalkOfInterest::new(walk.to_vec()).unwrap(),
                }
                .into(),
            )
            .unwrap();
        id
    }

    fn connect(
        &mut self,
        span: SpanEquipmentId,
        route_node_id: RouteNodeId,
        span_segment_id: SpanSegmentId,
        terminal_id: TerminalId,
        end: SpanSegmentEnd,
    ) {
        self.projection
            .apply(
                &SpanEquipmentEvent::SegmentsConnectedToTerminals {
                    id: span,
                    route_node_id,
                    connects: vec![SegmentTerminalConnect {
                        span_segment_id,
                        terminal_id,
                        end,
                    }],
                }
                .into(),
            )
            .unwrap();
    }
}

fn place_container(projection: &mut UtilityGraphProjection, node: RouteNodeId) -> NodeContainerId {
    let container = NodeContainer::place(NodeContainerId::new(), SpecificationId::new(), None, node, InterestId::new());
    let id = container.id;
    projection
        .apply(&NodeContainerEvent::PlacedInRouteNetwork { container }.into())
        .unwrap();
    id
}

fn place_terminal_equipment(
    projection: &mut UtilityGraphProjection,
    spec: &TerminalEquipmentSpecification,
    container: NodeContainerId,
    route_node_id: RouteNodeId,
    name: &str,
) -> TerminalEquipmentId {
    let equipment = TerminalEquipment::place(
        TerminalEquipmentId::new(),
        spec,
        projection.catalog(),
        container,
        None,
        Some(NamingInfo::named(name)),
    )
    .unwrap();
    let id = equipment.id;
    projection
        .apply(
            &TerminalEquipmentEvent::Placed {
                equipment,
                route_node_id,
            }
            .into(),
        )
        .unwrap();
    id
}
