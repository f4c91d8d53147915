//! Ecosystem cellular erosion over layered ground material.
//!
//! Each cell carries depths of rock, sand and humus on top of a bedrock
//! elevation, plus soil moisture. One simulation iteration performs a random
//! "runoff event" per grid cell position: a water parcel does a constrained
//! random walk downhill (at most 25 steps), absorbing into the soil,
//! lifting or depositing granular material depending on the local grade and
//! slowly converting bedrock to rock to sand.
//!
//! The whole run executes on one background worker thread; the driver polls
//! progress through an atomic counter and recovers the eroded grid with
//! `join` once the worker is done. Cancellation is cooperative, observed at
//! row granularity.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;

use crate::erosion::utils::{logistic_between, random_weighted_pick, slope};
use crate::erosion::{Erosion, ErosionError};
use crate::grid::{CellGrid, ElevationCell, DIR_OFFSETS};
use crate::params::ParameterCollection;
use crate::task::{AsyncProgressTask, TaskHandle};
use crate::terrain::Terrain;

/// Physical elevation assigned to a full-scale heightmap sample when
/// importing into the working grid.
pub const ELEVATION_MAX: f32 = 500.0;

/// Maximum steps a single runoff walk may take.
const MAX_WALK_STEPS: usize = 25;

/// Ground material state of one cell. All quantities are depths in meters
/// and must stay non-negative; `clamp` is applied after every walk step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EcoCell {
    /// Loose rock depth.
    pub rock: f32,
    /// Sand / regolith depth.
    pub sand: f32,
    /// Humus depth.
    pub humus: f32,
    /// Bedrock elevation.
    pub bedrock: f32,
    /// Soil moisture content.
    pub moisture: f32,
}

impl EcoCell {
    /// Depth of loose material above the bedrock.
    pub fn granular_depth(&self) -> f32 {
        self.rock + self.sand + self.humus
    }

    /// Total surface elevation.
    pub fn total_elevation(&self) -> f32 {
        self.bedrock + self.granular_depth()
    }

    pub fn is_valid(&self) -> bool {
        self.rock >= 0.0
            && self.sand >= 0.0
            && self.humus >= 0.0
            && self.bedrock >= 0.0
            && self.moisture >= 0.0
    }

    pub fn clamp(&mut self) {
        self.rock = self.rock.max(0.0);
        self.sand = self.sand.max(0.0);
        self.humus = self.humus.max(0.0);
        self.bedrock = self.bedrock.max(0.0);
        self.moisture = self.moisture.max(0.0);
    }
}

impl ElevationCell for EcoCell {
    fn elevation(&self) -> f32 {
        self.bedrock
    }
    fn set_elevation(&mut self, elevation: f32) {
        self.bedrock = elevation;
    }
}

/// Working snapshot of the model's tunables, taken at task start.
#[derive(Clone, Debug)]
pub struct EcoParams {
    pub iterations: u32,
    pub time_step_years: f32,
    pub rainfall: f32,
    pub cell_size: f32,
    pub water_sediment_capacity_p: f32,
    pub soil_absorption: f32,
    pub slope_threshold_sediment_lift: f32,
    pub humus_water_capacity_p: f32,
    pub sand_water_capacity_p: f32,
    pub rock_water_capacity_p: f32,
    pub rock_erosion_base_value: f32,
    pub bedrock_water_capacity_p: f32,
    pub bedrock_erosion_base_value: f32,
}

impl Default for EcoParams {
    fn default() -> Self {
        Self {
            iterations: 5,
            time_step_years: 1.0,
            rainfall: 10.0,
            cell_size: 30.0,
            water_sediment_capacity_p: 0.05,
            soil_absorption: 0.2,
            slope_threshold_sediment_lift: 0.1,
            humus_water_capacity_p: 0.8,
            sand_water_capacity_p: 0.3,
            rock_water_capacity_p: 0.05,
            rock_erosion_base_value: 0.0005,
            bedrock_water_capacity_p: 0.01,
            bedrock_erosion_base_value: 0.0005,
        }
    }
}

impl EcoParams {
    pub fn register(&self, parameters: &mut ParameterCollection) {
        // min == max marks the unconstrained integer knob.
        parameters.add_parameter("iterations", 1.0, 1.0, self.iterations as f32);
        parameters.add_parameter("time_step_years", 0.05, 10.0, self.time_step_years);
        // rainfall in meters per year
        parameters.add_parameter("rainfall", 0.0, 15.0, self.rainfall);
        parameters.add_parameter("cell_size", 0.5, 150.0, self.cell_size);
        // fraction of the water volume that can be carried as sediment
        parameters.add_parameter(
            "water_sediment_capacity_p",
            0.0,
            1.0,
            self.water_sediment_capacity_p,
        );
        parameters.add_parameter("soil_absorption", 0.0, 1.0, self.soil_absorption);
        // grade above which material is lifted rather than deposited
        parameters.add_parameter(
            "slope_threshold_sediment_lift",
            0.01,
            1.0,
            self.slope_threshold_sediment_lift,
        );
        parameters.add_parameter(
            "humus_water_capacity_p",
            0.01,
            1.0,
            self.humus_water_capacity_p,
        );
        parameters.add_parameter(
            "sand_water_capacity_p",
            0.01,
            1.0,
            self.sand_water_capacity_p,
        );
        parameters.add_parameter(
            "rock_water_capacity_p",
            0.01,
            1.0,
            self.rock_water_capacity_p,
        );
        parameters.add_parameter(
            "rock_erosion_base_value",
            0.0001,
            0.1,
            self.rock_erosion_base_value,
        );
        parameters.add_parameter(
            "bedrock_water_capacity_p",
            0.01,
            1.0,
            self.bedrock_water_capacity_p,
        );
        parameters.add_parameter(
            "bedrock_erosion_base_value",
            0.0001,
            0.1,
            self.bedrock_erosion_base_value,
        );
    }

    pub fn snapshot(parameters: &ParameterCollection) -> Self {
        Self {
            iterations: parameters.get_param("iterations") as u32,
            time_step_years: parameters.get_param("time_step_years"),
            rainfall: parameters.get_param("rainfall"),
            cell_size: parameters.get_param("cell_size"),
            water_sediment_capacity_p: parameters.get_param("water_sediment_capacity_p"),
            soil_absorption: parameters.get_param("soil_absorption"),
            slope_threshold_sediment_lift: parameters.get_param("slope_threshold_sediment_lift"),
            humus_water_capacity_p: parameters.get_param("humus_water_capacity_p"),
            sand_water_capacity_p: parameters.get_param("sand_water_capacity_p"),
            rock_water_capacity_p: parameters.get_param("rock_water_capacity_p"),
            rock_erosion_base_value: parameters.get_param("rock_erosion_base_value"),
            bedrock_water_capacity_p: parameters.get_param("bedrock_water_capacity_p"),
            bedrock_erosion_base_value: parameters.get_param("bedrock_erosion_base_value"),
        }
    }
}

/// One water parcel walking downhill across the grid.
pub struct RunoffEvent<'a> {
    params: &'a EcoParams,
    step_time_constant: f32,
    /// Remaining water volume.
    pub water: f32,
    pub sediment_sand: f32,
    pub sediment_humus: f32,
    pub sediment_rock: f32,
}

impl<'a> RunoffEvent<'a> {
    pub fn new(params: &'a EcoParams, step_time_constant: f32) -> Self {
        Self {
            params,
            step_time_constant,
            water: 0.0,
            sediment_sand: 0.0,
            sediment_humus: 0.0,
            sediment_rock: 0.0,
        }
    }

    fn reset(&mut self, water: f32) {
        self.water = water;
        self.sediment_sand = 0.0;
        self.sediment_humus = 0.0;
        self.sediment_rock = 0.0;
    }

    /// Maximum sediment the parcel can carry at its current water volume.
    pub fn sediment_capacity(&self) -> f32 {
        self.water * self.params.water_sediment_capacity_p
    }

    pub fn current_sediment(&self) -> f32 {
        self.sediment_humus + self.sediment_sand + self.sediment_rock
    }

    fn sediment_saturation(&self) -> f32 {
        self.current_sediment() / self.sediment_capacity().max(1e-6)
    }

    /// How much water a cell's material column can hold, weighted by the
    /// per-material capacity coefficients.
    fn cell_moisture_capacity(&self, cell: &EcoCell) -> f32 {
        self.params.humus_water_capacity_p * cell.humus
            + self.params.sand_water_capacity_p * cell.sand
            + self.params.rock_water_capacity_p * cell.rock
            + self.params.bedrock_water_capacity_p * cell.bedrock
    }

    fn deposition_amount(&self, carried: f32, r_slope: f32) -> f32 {
        let deposit = self.step_time_constant * (1.0 - r_slope) * carried;
        deposit.min(carried)
    }

    fn lift_amount(&self, available: f32, r_slope: f32) -> f32 {
        let lift = self.step_time_constant * r_slope * available;
        lift.min(available)
    }

    /// Solid material erosion in meters, slope- and water-weighted, damped
    /// by sediment saturation and the shielding granular layer.
    fn erosion_amount(
        &self,
        erosion_base: f32,
        available: f32,
        r_slope: f32,
        saturation: f32,
        granular_depth: f32,
    ) -> f32 {
        let erosion = self.step_time_constant
            * erosion_base
            * self.water
            * (r_slope + 0.2 * logistic_between(saturation, 0.0, 1.0, 1.0))
            * (1.0 - logistic_between(granular_depth, 0.1, 2.0, 1.0));
        erosion.min(available)
    }

    /// Advance the walk one step at (x, y). Returns the chosen downhill
    /// direction, or `None` when no neighbor is lower (the caller then
    /// deposits everything carried and terminates the walk).
    pub fn step<R: Rng>(
        &mut self,
        grid: &mut CellGrid<EcoCell>,
        x: i32,
        y: i32,
        rng: &mut R,
    ) -> Option<usize> {
        let cell_distance = self.params.cell_size;
        let c_elevation = grid.safe_get(x, y)?.total_elevation();

        // Slopes toward strictly lower neighbors; everything else stays zero.
        let mut slopes = [0.0f32; 8];
        for (i, &(dx, dy)) in DIR_OFFSETS.iter().enumerate() {
            if let Some(neighbor) = grid.safe_get(x + dx, y + dy) {
                let n_elevation = neighbor.total_elevation();
                if n_elevation < c_elevation {
                    slopes[i] = slope(c_elevation, n_elevation, cell_distance);
                }
            }
        }

        let dir = random_weighted_pick(&slopes, rng)?;
        let grade = slopes[dir].abs();
        let r_slope = logistic_between(grade, -4.0, 5.0, 10.0);
        let saturation = self.sediment_saturation();

        let cell = grid.at_mut(x as usize, y as usize);

        // Absorption into soil moisture, bounded by remaining capacity and
        // by the parcel itself.
        let absorb = self.step_time_constant * self.params.soil_absorption * self.water
            * (1.0 - r_slope);
        let absorb = absorb
            .min(self.cell_moisture_capacity(cell) - cell.moisture)
            .clamp(0.0, self.water);
        self.water -= absorb;
        cell.moisture += absorb;

        // Lift on steep grades, deposit on shallow ones. Positive deltas
        // move material from the cell into the parcel.
        let (mut sand, mut humus, mut rock);
        if grade > self.params.slope_threshold_sediment_lift {
            sand = self.lift_amount(cell.sand, r_slope);
            humus = self.lift_amount(cell.humus, r_slope);
            rock = self.lift_amount(cell.rock, r_slope);
        } else {
            sand = -self.deposition_amount(self.sediment_sand, r_slope);
            humus = -self.deposition_amount(self.sediment_humus, r_slope);
            rock = -self.deposition_amount(self.sediment_rock, r_slope);
        }

        // Bedrock -> rock -> sand conversion, bounded by available material.
        let granular = cell.granular_depth();
        let b_r = self.erosion_amount(
            self.params.bedrock_erosion_base_value,
            cell.bedrock,
            r_slope,
            saturation,
            granular,
        );
        let r_c = self.erosion_amount(
            self.params.rock_erosion_base_value,
            cell.rock,
            r_slope,
            saturation,
            granular,
        );
        cell.bedrock -= b_r;
        cell.rock += b_r - r_c;
        cell.sand += r_c;

        // Clamp total carried sediment to capacity, scaling the three
        // materials proportionally so the mix is conserved.
        let capacity = self.sediment_capacity();
        let current = self.current_sediment();
        let remaining = capacity - current;
        let total = sand + humus + rock;
        if current > capacity {
            sand = self.sediment_sand / current * remaining;
            humus = self.sediment_humus / current * remaining;
            rock = self.sediment_rock / current * remaining;
        } else if total > remaining {
            sand = sand / (total + 1e-4) * remaining;
            humus = humus / (total + 1e-4) * remaining;
            rock = rock / (total + 1e-4) * remaining;
        }

        self.sediment_sand += sand;
        cell.sand -= sand;

        self.sediment_humus += humus;
        cell.humus -= humus;

        self.sediment_rock += rock;
        cell.rock -= rock;

        debug_assert!(!cell.total_elevation().is_nan());
        Some(dir)
    }

    /// Run a full walk starting at `start` with `water` volume of rain.
    pub fn run<R: Rng>(
        &mut self,
        grid: &mut CellGrid<EcoCell>,
        start: (i32, i32),
        water: f32,
        rng: &mut R,
    ) {
        self.reset(water);
        let (mut x, mut y) = start;
        if grid.safe_get(x, y).is_none() {
            return;
        }
        for _ in 0..MAX_WALK_STEPS {
            let dir = self.step(grid, x, y, rng);
            grid.at_mut(x as usize, y as usize).clamp();
            match dir {
                Some(dir) if self.water > 0.0 => {
                    let (dx, dy) = DIR_OFFSETS[dir];
                    x += dx;
                    y += dy;
                    if grid.safe_get(x, y).is_none() {
                        break;
                    }
                }
                _ => {
                    // Nowhere lower to go: drop everything carried here.
                    let cell = grid.at_mut(x as usize, y as usize);
                    cell.sand += self.sediment_sand;
                    cell.humus += self.sediment_humus;
                    cell.rock += self.sediment_rock;
                    self.sediment_sand = 0.0;
                    self.sediment_humus = 0.0;
                    self.sediment_rock = 0.0;
                    break;
                }
            }
        }
    }
}

/// Outcome of one background run. The grid travels back to the caller so
/// the worker's exclusive ownership ends exactly at join.
pub struct EcosystemRun {
    pub grid: CellGrid<EcoCell>,
    pub completed: bool,
}

/// Execute the full simulation on the worker thread: `iterations` passes of
/// one runoff event per grid cell position, visited in raster order with a
/// random event origin. Progress counts completed rows across all
/// iterations; cancellation is observed between rows.
pub fn run_erosion(
    mut grid: CellGrid<EcoCell>,
    params: EcoParams,
    handle: &TaskHandle,
    rng: &mut ChaCha8Rng,
) -> EcosystemRun {
    let iterations = params.iterations.max(1) as usize;
    let (width, height) = (grid.width, grid.height);
    let total_rows = (iterations * height) as f32;
    let mut runoff = RunoffEvent::new(&params, params.time_step_years);

    for iteration in 0..iterations {
        for y in 0..height {
            if handle.is_cancelled() {
                return EcosystemRun {
                    grid,
                    completed: false,
                };
            }
            for _ in 0..width {
                let sx = rng.gen_range(0..width) as i32;
                let sy = rng.gen_range(0..height) as i32;
                runoff.run(&mut grid, (sx, sy), params.rainfall, rng);
            }
            handle.set_progress((iteration * height + y + 1) as f32 / total_rows);
        }
    }

    // Fold the granular column back into the bedrock elevation so the
    // exported heightmap reflects the full surface.
    grid.cells_mut().par_iter_mut().for_each(|cell| {
        cell.bedrock += cell.granular_depth();
    });

    EcosystemRun {
        grid,
        completed: true,
    }
}

/// Background-thread ecosystem erosion simulator.
pub struct EcosystemCpu {
    target: Arc<Terrain>,
    parameters: ParameterCollection,
    task: AsyncProgressTask<EcosystemRun>,
    stopped: bool,
    seed: u64,
}

impl EcosystemCpu {
    pub fn new(target: Arc<Terrain>) -> Self {
        let mut parameters = ParameterCollection::new();
        EcoParams::default().register(&mut parameters);
        Self {
            target,
            parameters,
            task: AsyncProgressTask::new(),
            stopped: false,
            seed: rand::random(),
        }
    }

    /// Fix the RNG seed for the next run (deterministic output).
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

impl Erosion for EcosystemCpu {
    fn name(&self) -> &str {
        "ecosystem"
    }

    fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterCollection {
        &mut self.parameters
    }

    fn start_erosion_task(&mut self) -> Result<(), ErosionError> {
        if self.is_running() {
            return Ok(());
        }
        // A stopped worker may still be draining its current row; the task
        // cannot restart until it lands, so skip the grid import too and
        // leave the model stopped. Callers retry on a later frame.
        if !self.task.is_done() {
            return Ok(());
        }
        // Discard an unclaimed result from a previous run.
        let _ = self.task.join();

        let (width, height) = self.target.size();
        if width == 0 || height == 0 {
            return Err(ErosionError::EmptyTarget { width, height });
        }

        let mut grid = CellGrid::new(width, height, ELEVATION_MAX);
        grid.copy_elevation(&self.target.heightfield())?;

        let params = EcoParams::snapshot(&self.parameters);
        let seed = self.seed;
        self.stopped = false;
        self.task.start(move |handle| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            run_erosion(grid, params, &handle, &mut rng)
        });
        Ok(())
    }

    fn stop_erosion_task(&mut self) {
        self.stopped = true;
        self.task.notify_stop();
    }

    /// The worker advances on its own; per-frame update only has to poll.
    fn update(&mut self) {}

    fn progress(&self) -> f32 {
        self.task.progress()
    }

    fn is_running(&self) -> bool {
        !self.stopped && !self.task.is_done()
    }

    /// Aggregate finished results into the target terrain. Returns true
    /// exactly once per completed run; cancelled runs are discarded.
    fn join(&mut self) -> bool {
        if let Some(run) = self.task.join() {
            if run.completed {
                let mut hf = self.target.heightfield_mut();
                match run.grid.copy_elevation_to(&mut hf) {
                    Ok(()) => return true,
                    Err(e) => eprintln!("ecosystem erosion: write-back failed: {}", e),
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Terrain;
    use std::time::Duration;

    fn uniform_grid(width: usize, height: usize, bedrock: f32) -> CellGrid<EcoCell> {
        let mut grid: CellGrid<EcoCell> = CellGrid::new(width, height, ELEVATION_MAX);
        for cell in grid.cells_mut() {
            cell.bedrock = bedrock;
        }
        grid
    }

    fn total_mass(grid: &CellGrid<EcoCell>) -> f64 {
        grid.cells()
            .iter()
            .map(|c| (c.bedrock + c.rock + c.sand + c.humus) as f64)
            .sum()
    }

    fn test_params() -> EcoParams {
        EcoParams {
            iterations: 1,
            rainfall: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_grid_conserves_mass() {
        // All slopes are zero on a flat grid, so every walk terminates
        // immediately and redeposits in place.
        let mut grid = uniform_grid(4, 4, 1.0);
        let params = test_params();
        let before = total_mass(&grid);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut runoff = RunoffEvent::new(&params, 1.0);
        for _ in 0..16 {
            let sx = rng.gen_range(0..4);
            let sy = rng.gen_range(0..4);
            runoff.run(&mut grid, (sx, sy), params.rainfall, &mut rng);
        }

        let after = total_mass(&grid);
        assert!((before - after).abs() < 1e-4, "mass drifted: {} -> {}", before, after);
    }

    #[test]
    fn test_cells_stay_non_negative() {
        // A steep ramp with a thin soil cover stresses lift and erosion.
        let mut grid = uniform_grid(8, 8, 0.0);
        for y in 0..8 {
            for x in 0..8 {
                let cell = grid.at_mut(x, y);
                cell.bedrock = (8 - x) as f32 * 3.0;
                cell.sand = 0.01;
                cell.humus = 0.005;
            }
        }

        let params = EcoParams {
            iterations: 2,
            rainfall: 5.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut runoff = RunoffEvent::new(&params, 1.0);
        for _ in 0..200 {
            let sx = rng.gen_range(0..8);
            let sy = rng.gen_range(0..8);
            runoff.run(&mut grid, (sx, sy), params.rainfall, &mut rng);
        }

        for cell in grid.cells() {
            assert!(cell.is_valid(), "negative quantity in {:?}", cell);
        }
    }

    #[test]
    fn test_lift_moves_mass_into_parcel() {
        // Two-cell slope: the west cell is higher, so a walk starting there
        // lifts material. Cell mass lost must equal parcel mass gained.
        let mut grid = uniform_grid(2, 1, 0.0);
        grid.at_mut(0, 0).bedrock = 10.0;
        grid.at_mut(0, 0).sand = 0.5;
        grid.at_mut(1, 0).bedrock = 1.0;

        let params = EcoParams {
            rainfall: 1.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut runoff = RunoffEvent::new(&params, 1.0);
        runoff.reset(1.0);

        let cell_before = *grid.at(0, 0);
        let dir = runoff.step(&mut grid, 0, 0, &mut rng);
        assert!(dir.is_some());

        let cell_after = *grid.at(0, 0);
        let cell_loss = (cell_before.bedrock + cell_before.rock + cell_before.sand
            + cell_before.humus)
            - (cell_after.bedrock + cell_after.rock + cell_after.sand + cell_after.humus);
        let parcel_gain = runoff.current_sediment();
        assert!(
            (cell_loss - parcel_gain).abs() < 1e-5,
            "lift not conservative: lost {} carried {}",
            cell_loss,
            parcel_gain
        );
    }

    #[test]
    fn test_run_erosion_reports_full_progress() {
        let grid = uniform_grid(6, 6, 2.0);
        let params = test_params();

        let mut task = AsyncProgressTask::new();
        task.start(move |handle| {
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            run_erosion(grid, params, &handle, &mut rng)
        });
        while !task.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!((task.progress() - 1.0).abs() < 1e-5);
        let run = task.join().unwrap();
        assert!(run.completed);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let grid = uniform_grid(16, 16, 2.0);
        let params = EcoParams {
            iterations: 3,
            ..Default::default()
        };

        let mut task = AsyncProgressTask::new();
        task.start(move |handle| {
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            run_erosion(grid, params, &handle, &mut rng)
        });

        let mut last = 0.0f32;
        while !task.is_done() {
            let p = task.progress();
            assert!(p >= last, "progress went backwards: {} < {}", p, last);
            last = p;
        }
        let _ = task.join();
    }

    fn make_model(width: usize, height: usize) -> EcosystemCpu {
        let terrain = Arc::new(Terrain::new(width, height));
        {
            let mut hf = terrain.heightfield_mut();
            let max = hf.max_sample();
            for y in 0..height {
                for x in 0..width {
                    hf.set(x, y, (x as f32 / width as f32) * max);
                }
            }
        }
        EcosystemCpu::new(terrain)
    }

    #[test]
    fn test_double_start_is_noop() {
        let mut model = make_model(8, 8);
        model.set_seed(1);
        assert!(model.set_param("iterations", 2.0));

        model.start_erosion_task().unwrap();
        assert!(model.is_running() || model.progress() > 0.0);

        // Second start while the worker may still be running must not error
        // or reset the run.
        model.start_erosion_task().unwrap();
        model.stop_erosion_task();
        assert!(!model.is_running());
    }

    #[test]
    fn test_stop_before_update_is_safe() {
        let mut model = make_model(8, 8);
        model.start_erosion_task().unwrap();
        model.stop_erosion_task();

        assert!(!model.is_running());
        // Progress may be anything in [0, 1] here; it just must not panic.
        let p = model.progress();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_join_writes_back_to_terrain() {
        let mut model = make_model(8, 8);
        model.set_seed(42);
        model.start_erosion_task().unwrap();

        while model.is_running() {
            model.update();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(model.join());
        // A second join has nothing to aggregate.
        assert!(!model.join());
    }

    #[test]
    fn test_restart_after_stop_completes_cleanly() {
        let mut model = make_model(16, 16);
        model.set_seed(13);
        assert!(model.set_param("iterations", 2.0));

        model.start_erosion_task().unwrap();
        model.stop_erosion_task();
        assert!(!model.is_running());

        // Restart attempts while the cancelled worker drains are no-ops;
        // once it lands, start spins up a fresh run whose results reach
        // the terrain through join.
        let mut joined = false;
        for _ in 0..5000 {
            model.start_erosion_task().unwrap();
            if model.join() {
                joined = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(joined, "restarted run never completed");
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut model = make_model(4, 4);
        model.stop_erosion_task();
        assert!(!model.is_running());
    }

    #[test]
    fn test_empty_target_fails_start() {
        let terrain = Arc::new(Terrain::new(0, 0));
        let mut model = EcosystemCpu::new(terrain);
        assert!(matches!(
            model.start_erosion_task(),
            Err(ErosionError::EmptyTarget { .. })
        ));
        assert!(!model.is_running());
    }
}
