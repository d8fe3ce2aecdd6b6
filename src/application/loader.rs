//! SUMO network (`.net.xml`) loader.
//!
//! Junctions become intersections, `tlLogic`s become traffic lights and edges
//! between known junctions become road connections. A road is only added when
//! its destination has a traffic light, which controls traffic entering it.

use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::{debug, info, instrument, warn};

use crate::application::error_ext::IoResultExt;
use crate::application::{ApplicationError, ApplicationResult, DataManager};
use crate::domain::{Entity, Intersection, Position, TrafficLight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Junctions,
    TrafficLights,
    Edges,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStage::Junctions => write!(f, "junctions"),
            LoadStage::TrafficLights => write!(f, "traffic lights"),
            LoadStage::Edges => write!(f, "edges"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub stage: LoadStage,
    /// Overall completion in `[0, 1]`
    pub fraction: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub intersections: usize,
    pub traffic_lights: usize,
    pub road_connections: usize,
}

#[derive(Debug, Clone)]
pub struct NetworkLoader {
    path: PathBuf,
}

impl NetworkLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the network file into `dm`.
    #[instrument(level = "debug", skip(self, dm, progress), fields(path = %self.path.display()))]
    pub fn load(
        &self,
        dm: &mut DataManager,
        progress: impl FnMut(LoadProgress),
    ) -> ApplicationResult<LoadSummary> {
        let text = std::fs::read_to_string(&self.path).with_path_context("read network", &self.path)?;
        self.load_str(&text, dm, progress)
    }

    /// Parse network XML held in memory.
    pub fn load_str(
        &self,
        text: &str,
        dm: &mut DataManager,
        mut progress: impl FnMut(LoadProgress),
    ) -> ApplicationResult<LoadSummary> {
        let doc = Document::parse(text).map_err(|e| self.parse_error(e.to_string()))?;
        let net = doc.root_element();
        if net.tag_name().name() != "net" {
            return Err(self.parse_error(format!(
                "expected <net> root element, found <{}>",
                net.tag_name().name()
            )));
        }

        let mut summary = LoadSummary::default();

        summary.intersections = self.parse_junctions(net, dm)?;
        progress(LoadProgress {
            stage: LoadStage::Junctions,
            fraction: 1.0 / 3.0,
        });

        summary.traffic_lights = self.parse_traffic_lights(net, dm);
        progress(LoadProgress {
            stage: LoadStage::TrafficLights,
            fraction: 2.0 / 3.0,
        });

        summary.road_connections = self.parse_edges(net, dm);
        progress(LoadProgress {
            stage: LoadStage::Edges,
            fraction: 1.0,
        });

        info!(
            "loaded {} intersections, {} traffic lights, {} roads from {}",
            summary.intersections,
            summary.traffic_lights,
            summary.road_connections,
            self.path.display()
        );
        Ok(summary)
    }

    fn parse_error(&self, reason: String) -> ApplicationError {
        ApplicationError::NetworkParse {
            path: self.path.clone(),
            reason,
        }
    }

    fn parse_junctions(&self, net: Node, dm: &mut DataManager) -> ApplicationResult<usize> {
        let junctions = elements(net, "junctions", "junction");
        if junctions.is_empty() {
            return Err(self.parse_error("No <junction> elements found in network file".into()));
        }

        let mut count = 0;
        for junction in junctions {
            if junction.attribute("type") == Some("internal") {
                continue;
            }
            let Some(id) = junction.attribute("id") else {
                warn!("junction without id skipped");
                continue;
            };
            let position = Position::new(float_attr(junction, "x"), float_attr(junction, "y"));
            debug!("junction {} at {}", id, position);
            dm.add_intersection(Intersection::new(id, position));
            count += 1;
        }
        Ok(count)
    }

    fn parse_traffic_lights(&self, net: Node, dm: &mut DataManager) -> usize {
        let logics = elements(net, "tlLogics", "tlLogic");
        if logics.is_empty() {
            info!("no <tlLogic> elements, skipping traffic lights");
            return 0;
        }

        let mut count = 0;
        for logic in logics {
            if let Some(id) = logic.attribute("id") {
                // a tlLogic may be listed once per program
                if dm.traffic_light(id).is_none() {
                    dm.add_traffic_light(TrafficLight::new(id));
                    count += 1;
                }
            }
        }
        count
    }

    fn parse_edges(&self, net: Node, dm: &mut DataManager) -> usize {
        let mut road_id = 1u32;
        let mut count = 0;

        for edge in elements(net, "edges", "edge") {
            if edge.attribute("function") == Some("internal") {
                continue;
            }
            let (Some(from), Some(to)) = (edge.attribute("from"), edge.attribute("to")) else {
                continue;
            };
            let (Some(source), Some(target)) = (dm.intersection(from), dm.intersection(to)) else {
                debug!("edge {:?}: unknown junction, skipped", edge.attribute("id"));
                continue;
            };
            let Some(light_id) = dm.traffic_light(to).map(|l| l.id().to_string()) else {
                continue;
            };

            let length = edge
                .attribute("length")
                .and_then(|v| v.parse::<f64>().ok())
                .or_else(|| first_lane_length(edge))
                .unwrap_or_else(|| source.position().distance_to(&target.position()));

            match dm.connect(from, road_id, to, &light_id, length) {
                Ok(()) => {
                    debug!("road {} {} -> {} ({:.1} m)", road_id, from, to, length);
                    road_id += 1;
                    count += 1;
                }
                Err(e) => warn!("failed to add road {} -> {}: {}", from, to, e),
            }
        }
        count
    }
}

/// Elements named `item` directly under `net` or inside a `<group>` wrapper.
fn elements<'a, 'input>(net: Node<'a, 'input>, group: &str, item: &str) -> Vec<Node<'a, 'input>> {
    let mut found = vec![];
    for child in net.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        if name == item {
            found.push(child);
        } else if name == group {
            found.extend(
                child
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == item),
            );
        }
    }
    found
}

fn float_attr(node: Node, name: &str) -> f64 {
    node.attribute(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

fn first_lane_length(edge: Node) -> Option<f64> {
    edge.children()
        .find(|n| n.is_element() && n.tag_name().name() == "lane")
        .and_then(|lane| lane.attribute("length"))
        .and_then(|v| v.parse().ok())
}
