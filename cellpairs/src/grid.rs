use log::{info, warn};
use ndarray::Array3;

use crate::cells::{self, cooperative_insert, Cell, CellEnergy, CellGradient, InsertOutcome, InsertRequest, CELL_CAPACITY};
use crate::group::Group;
use crate::potentials::{LennardJones, LennardJonesEnergy, LennardJonesGradient};
use crate::reduce::{self, CountParticles, LaunchConfig, PairOperator, SingleOperator};
use crate::sort::{self, OverflowPolicy, SortReport};
use crate::{BoxGeometry, Error, NeighborOffsetList, Shear};

/// Parameters for a [`CellGrid`]
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GridParameters {
    /// Interaction cutoff radius
    pub cutoff: f64,
    /// Lengths of the box along the three axis
    pub lengths: [f64; 3],
    /// Shear of the box, defaults to an orthorhombic box
    #[serde(default)]
    pub shear: Shear,
    /// Number of cells along each box vector
    pub grid: [usize; 3],
    /// Number of slots in each cell. This must be the same as the group width
    /// used by the engines, i.e. 32.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// What to do with particles when their cell is full
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// Parameters of the Lennard-Jones potential
    #[serde(default)]
    pub lennard_jones: LennardJones,
}

fn default_capacity() -> usize {
    CELL_CAPACITY
}

/// Number of particles in a set of cells and the sum of their positions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellSummary {
    /// total number of particles
    pub particles: usize,
    /// sum of all particles positions
    pub position_sum: [f64; 3],
}

impl std::fmt::Display for CellSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f, "{} particles, position sum = ({}, {}, {})",
            self.particles, self.position_sum[0], self.position_sum[1], self.position_sum[2]
        )
    }
}

/// A `CellGrid` bundles everything needed to run the engines on a given box:
/// the geometry, the neighbor offsets list for the cutoff, and the launch
/// configuration. Cell buffers and outputs are still owned by the caller.
#[derive(Debug, Clone)]
pub struct CellGrid {
    parameters: GridParameters,
    json: String,
    geometry: BoxGeometry,
    neighbors: NeighborOffsetList,
    launch: LaunchConfig,
}

impl CellGrid {
    /// Create a new `CellGrid` with the given parameters
    pub fn new(parameters: GridParameters) -> Result<CellGrid, Error> {
        if parameters.capacity != CELL_CAPACITY {
            return Err(Error::GroupWidth {
                expected: parameters.capacity,
                got: CELL_CAPACITY,
            });
        }

        parameters.lennard_jones.validate()?;

        let geometry = BoxGeometry::new(parameters.lengths, parameters.shear, parameters.grid)?;
        let neighbors = NeighborOffsetList::new(&geometry, parameters.cutoff)?;
        if neighbors.is_empty() {
            return Err(Error::DegenerateGeometry(format!(
                "no neighboring cell found for cutoff {}", parameters.cutoff
            )));
        }

        let json = serde_json::to_string(&parameters)?;
        let launch = LaunchConfig::for_geometry(&geometry);

        info!(
            "created cell grid with {} cells and {} neighboring cells per cell",
            geometry.n_cells(), neighbors.n_offsets()
        );

        return Ok(CellGrid {
            parameters: parameters,
            json: json,
            geometry: geometry,
            neighbors: neighbors,
            launch: launch,
        });
    }

    /// Create a new `CellGrid` from parameters formatted as JSON
    pub fn from_json(parameters: &str) -> Result<CellGrid, Error> {
        let parameters = serde_json::from_str::<GridParameters>(parameters)?;
        return CellGrid::new(parameters);
    }

    /// Get the parameters used to create this grid, formatted as JSON
    pub fn parameters(&self) -> &str {
        &self.json
    }

    /// Get the geometry of this grid
    pub fn geometry(&self) -> &BoxGeometry {
        &self.geometry
    }

    /// Get the neighbor offsets list of this grid
    pub fn neighbors(&self) -> &NeighborOffsetList {
        &self.neighbors
    }

    /// Get the launch configuration covering all cells of this grid
    pub fn launch(&self) -> LaunchConfig {
        self.launch
    }

    /// Get the number of cells in this grid
    pub fn n_cells(&self) -> usize {
        self.geometry.n_cells()
    }

    /// Allocate a new buffer of empty cells for this grid
    pub fn new_cells(&self) -> Vec<Cell> {
        cells::new_buffer(self.n_cells())
    }

    /// Add `particles`, given as `(tag, position)`, to the cells containing
    /// them. Positions are wrapped inside the box, and tags must not be zero.
    ///
    /// Particles whose cell is already full are handled according to the
    /// overflow policy of this grid.
    pub fn insert_particles(&self, cells: &mut [Cell], particles: &[(u32, [f32; 3])]) -> Result<SortReport, Error> {
        self.launch.validate_buffer("cells", cells.len())?;
        if particles.iter().any(|&(tag, _)| tag == 0) {
            return Err(Error::InvalidParameter(
                "particle tags must not be zero".into()
            ));
        }

        let cells = &*cells;
        let group = Group::new(self.launch.group_width);
        let mut report = SortReport::default();
        for &(tag, position) in particles {
            let (bin, position) = self.geometry.locate(position);
            let requests = [InsertRequest { tag: tag, bin: bin }; CELL_CAPACITY];
            match cooperative_insert(&group, cells, &requests, 0) {
                InsertOutcome::Inserted(slot) => {
                    cells[bin].store_position(slot, position);
                    report.moved += 1;
                }
                InsertOutcome::Full | InsertOutcome::Rejected => report.dropped += 1,
            }
        }

        if report.dropped != 0 {
            warn!(
                "{} particle(s) could not be inserted because their cell was full",
                report.dropped
            );

            if self.parameters.overflow == OverflowPolicy::Error {
                return Err(Error::CellOverflow { dropped: report.dropped });
            }
        }

        return Ok(report);
    }

    /// Move the particles in `source` to their current cell in `destination`
    pub fn redistribute(&self, source: &[Cell], destination: &mut [Cell]) -> Result<SortReport, Error> {
        sort::redistribute(self.launch, &self.geometry, source, destination, self.parameters.overflow)
    }

    /// Run a single-cell reduction over all `cells`
    pub fn compute_single<O: SingleOperator>(&self, operator: &O, cells: &[Cell], output: &mut [O::Output]) -> Result<(), Error> {
        reduce::launch_single(self.launch, operator, cells, output)
    }

    /// Run a pair reduction over all `cells`
    pub fn compute_pairs<O: PairOperator>(&self, operator: &O, cells: &[Cell], output: &mut [O::Output]) -> Result<(), Error> {
        reduce::launch_pairs(self.launch, operator, &self.geometry, &self.neighbors, cells, output)
    }

    /// Count the particles in each cell
    pub fn count_particles(&self, cells: &[Cell]) -> Result<Vec<u32>, Error> {
        let mut counts = vec![0; self.n_cells()];
        self.compute_single(&CountParticles, cells, &mut counts)?;
        return Ok(counts);
    }

    /// Count the particles in each cell, arranged with the shape of the grid
    /// as `[nz, ny, nx]`
    pub fn occupancy_grid(&self, cells: &[Cell]) -> Result<Array3<u32>, Error> {
        let counts = self.count_particles(cells)?;
        let [nx, ny, nz] = self.geometry.grid();
        return Array3::from_shape_vec((nz, ny, nx), counts).map_err(|e| Error::InvalidParameter(
            format!("could not create the occupancy grid: {}", e)
        ));
    }

    /// Get the total number of particles and the sum of their positions
    pub fn summary(&self, cells: &[Cell]) -> CellSummary {
        let mut summary = CellSummary::default();
        for cell in cells {
            for (_, _, position) in cell.particles() {
                summary.particles += 1;
                summary.position_sum[0] += f64::from(position[0]);
                summary.position_sum[1] += f64::from(position[1]);
                summary.position_sum[2] += f64::from(position[2]);
            }
        }
        return summary;
    }

    /// Compute the Lennard-Jones energy of every particle
    pub fn energies(&self, cells: &[Cell]) -> Result<Vec<CellEnergy>, Error> {
        let operator = LennardJonesEnergy::new(self.parameters.lennard_jones, self.parameters.cutoff)?;
        let mut energies = vec![CellEnergy::default(); self.n_cells()];
        self.compute_pairs(&operator, cells, &mut energies)?;
        return Ok(energies);
    }

    /// Compute the total Lennard-Jones energy of the system
    pub fn total_energy(&self, cells: &[Cell]) -> Result<f64, Error> {
        let energies = self.energies(cells)?;
        return Ok(energies.iter().map(CellEnergy::total).sum());
    }

    /// Compute the gradient of the Lennard-Jones energy with respect to the
    /// position of every particle
    pub fn gradients(&self, cells: &[Cell]) -> Result<Vec<CellGradient>, Error> {
        let operator = LennardJonesGradient::new(self.parameters.lennard_jones, self.parameters.cutoff)?;
        let mut gradients = vec![CellGradient::default(); self.n_cells()];
        self.compute_pairs(&operator, cells, &mut gradients)?;
        return Ok(gradients);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::test_utils::{test_grid, test_parameters};
    use super::*;

    #[test]
    fn parameters() {
        let grid = CellGrid::from_json(r#"{
            "cutoff": 2.5,
            "lengths": [10.0, 10.0, 10.0],
            "grid": [4, 4, 4]
        }"#).unwrap();

        assert_eq!(grid.n_cells(), 64);
        assert_eq!(grid.launch(), LaunchConfig::new(64, 32));
        assert!(!grid.geometry().is_sheared());
        // cells at exactly the cutoff distance are not neighbors
        assert_eq!(grid.neighbors().n_offsets(), 27);

        let parameters = serde_json::from_str::<GridParameters>(grid.parameters()).unwrap();
        assert_eq!(parameters.capacity, 32);
        assert_eq!(parameters.overflow, OverflowPolicy::Drop);
        assert_eq!(parameters.lennard_jones, LennardJones::default());

        let error = CellGrid::from_json(r#"{"cutoff": 2.5, "lengths": [10.0, 10.0, 10.0]}"#).unwrap_err();
        assert!(matches!(error, Error::Json(_)));

        let error = CellGrid::from_json(r#"{
            "cutoff": 2.5, "lengths": [10.0, 10.0, 10.0], "grid": [4, 4, 4], "unknown": 3
        }"#).unwrap_err();
        assert!(error.to_string().starts_with("json error: unknown field `unknown`"));

        let mut parameters = test_parameters();
        parameters.capacity = 64;
        let error = CellGrid::new(parameters).unwrap_err();
        assert_eq!(
            error.to_string(),
            "group width mismatch: cells have 64 slots, but the launch uses groups of 32 lanes"
        );

        let mut parameters = test_parameters();
        parameters.grid = [0, 3, 3];
        assert!(matches!(CellGrid::new(parameters), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn schema() {
        let schema = schemars::schema_for!(GridParameters);
        let schema = serde_json::to_value(schema).unwrap();
        let properties = &schema["properties"];
        for name in ["cutoff", "lengths", "shear", "grid", "capacity", "overflow", "lennard_jones"] {
            assert!(properties.get(name).is_some(), "missing {} in the schema", name);
        }

        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }

    #[test]
    fn occupancy() {
        let grid = test_grid();
        let mut cells = grid.new_cells();
        let report = grid.insert_particles(&mut cells, &[
            (1, [0.5, 0.5, 0.5]),
            (1, [1.5, 0.5, 0.5]),
            (2, [1.6, 0.6, 0.5]),
            (1, [0.5, 0.5, 7.5]),
            // wrapped inside the box
            (1, [-0.5, 0.5, 0.5]),
        ]).unwrap();
        assert_eq!(report, SortReport { moved: 5, dropped: 0 });

        let [nx, ny, nz] = grid.geometry().grid();
        let occupancy = grid.occupancy_grid(&cells).unwrap();
        assert_eq!(occupancy.shape(), [nz, ny, nx]);
        assert_eq!(occupancy[[0, 0, 0]], 1);
        assert_eq!(occupancy[[0, 0, 1]], 2);
        assert_eq!(occupancy[[nz - 1, 0, 0]], 1);
        assert_eq!(occupancy[[0, 0, nx - 1]], 1);
        assert_eq!(occupancy.sum(), 5);

        let summary = grid.summary(&cells);
        assert_eq!(summary.particles, 5);
        assert_relative_eq!(summary.position_sum[2], 9.5, max_relative = 1e-6);

        let error = grid.insert_particles(&mut cells, &[(0, [0.0; 3])]).unwrap_err();
        assert_eq!(error.to_string(), "invalid parameter: particle tags must not be zero");
    }

    #[test]
    fn overflow_policy() {
        let mut parameters = test_parameters();
        parameters.overflow = OverflowPolicy::Error;
        let grid = CellGrid::new(parameters).unwrap();

        let mut cells = grid.new_cells();
        let particles = vec![(1, [0.5, 0.5, 0.5]); CELL_CAPACITY + 3];
        let error = grid.insert_particles(&mut cells, &particles).unwrap_err();
        assert!(matches!(error, Error::CellOverflow { dropped: 3 }));
        assert_eq!(cells[0].count(), CELL_CAPACITY);
    }

    #[test]
    fn dimer_energy() {
        let grid = test_grid();
        let mut cells = grid.new_cells();
        grid.insert_particles(&mut cells, &[(1, [3.0, 3.0, 3.0]), (1, [4.1, 3.0, 3.0])]).unwrap();

        // signed separation between the particles along x
        let d = 3.0 - f64::from(4.1f32);
        let expected = d.powi(-12) - 2.0 * d.powi(-6);
        assert_relative_eq!(grid.total_energy(&cells).unwrap(), expected, max_relative = 1e-5);

        let gradients = grid.gradients(&cells).unwrap();
        let total = gradients.iter()
            .flat_map(|cell| cell.gradient.iter())
            .fold([0.0; 3], |acc, g| [acc[0] + g[0], acc[1] + g[1], acc[2] + g[2]]);
        assert_relative_eq!(total[0], 0.0, epsilon = 1e-5);
        assert_eq!(total[1], 0.0);
        assert_eq!(total[2], 0.0);

        // dE/dx for the particle at x = 3, and the opposite for the other one
        let expected = 12.0 * (d.powi(-8) - d.powi(-14)) * d;
        for (position, sign) in [([3.0, 3.0, 3.0], 1.0), ([4.1, 3.0, 3.0], -1.0)] {
            let cell = &gradients[grid.geometry().bin_of(position)];
            let slot = cell.tags.iter().position(|&tag| tag != 0).expect("missing particle");
            assert_relative_eq!(f64::from(cell.gradient[slot][0]), sign * expected, max_relative = 1e-5);
            assert_eq!(cell.gradient[slot][1], 0.0);
            assert_eq!(cell.gradient[slot][2], 0.0);
        }
    }
}
