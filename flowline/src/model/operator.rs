use super::Distribution;

/// A human or robot operator shared between machines.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operator {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Machines this operator can control, by preference order.
    pub assigned_machines: Vec<String>,
    /// Travel times between machines.
    pub routes: Vec<TravelRoute>,
    /// Travel time for routes without an entry.
    pub default_travel: Distribution,
}

impl Operator {
    /// Creates an operator assigned to the specified machines.
    pub fn new(id: impl Into<String>, assigned_machines: Vec<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            assigned_machines,
            routes: Vec::new(),
            default_travel: Distribution::Constant(1.0),
        }
    }

    /// Sets the travel time from one machine to another, replacing any
    /// previous setting for that route.
    pub fn set_route(&mut self, from: &str, to: &str, time: Distribution, probe: bool) {
        self.routes.retain(|r| !(r.from == from && r.to == to));
        self.routes.push(TravelRoute {
            from: from.to_string(),
            to: to.to_string(),
            time,
            probe,
        });
    }

    /// Returns the configured route between two machines, if any.
    pub fn route(&self, from: &str, to: &str) -> Option<&TravelRoute> {
        self.routes.iter().find(|r| r.from == from && r.to == to)
    }

    /// Returns the travel time distribution between two machines.
    pub fn travel_time(&self, from: &str, to: &str) -> &Distribution {
        self.route(from, to)
            .map_or(&self.default_travel, |route| &route.time)
    }
}

/// Travel time of an operator along one directed route.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TravelRoute {
    /// Origin machine.
    pub from: String,
    /// Destination machine.
    pub to: String,
    /// Travel time.
    pub time: Distribution,
    /// Whether travel samples along this route are recorded.
    pub probe: bool,
}
