//! Tests for production slot search and scheduling
//!
//! Critical invariants tested:
//! - Slots are only offered strictly after fixed_before and inside the horizon
//! - schedule commits exactly `quantity` runs or leaves the ledger untouched
//! - Each committed run consumes one input, produces one output and pays its cost

use factory_simulator_core_rs::{
    FactoryProfile, FactorySimulator, Ledger, LineFilter, ProductionSlots, ScheduleRequest, Simulator,
    SimulatorConfig, SimulatorError, SlotMethod, StepWindow,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_simulator(n_lines: usize, n_processes: usize, n_steps: usize, balance: i64) -> Simulator {
    let profile = FactoryProfile::uniform(n_lines, n_processes, n_steps, 1);
    Simulator::new(profile, SimulatorConfig::with_balance(balance)).unwrap()
}

fn with_inventory(n_lines: usize, n_steps: usize, balance: i64, inventory: Vec<i64>) -> Simulator {
    let profile = FactoryProfile::uniform(n_lines, inventory.len() - 1, n_steps, 1);
    let config = SimulatorConfig {
        initial_balance: balance,
        initial_inventory: Some(inventory),
        ..SimulatorConfig::default()
    };
    Simulator::new(profile, config).unwrap()
}

/// (step, line) cells running `process`
fn cells_running(sim: &Simulator, process: usize) -> Vec<(usize, usize)> {
    let schedules = sim.line_schedules_to(sim.n_steps() - 1);
    let mut cells = Vec::new();
    for (line, row) in schedules.iter().enumerate() {
        for (step, &command) in row.iter().enumerate() {
            if command == Some(process) {
                cells.push((step, line));
            }
        }
    }
    cells.sort();
    cells
}

fn snapshot(sim: &Simulator) -> Ledger {
    sim.ledger().clone()
}

// ============================================================================
// available_for_production
// ============================================================================

#[test]
fn test_too_few_free_slots_returns_nothing() {
    // One line; steps 1 and 2 are the only changeable cells in (0, 2)
    let sim = create_simulator(1, 2, 10, 100);
    let before = snapshot(&sim);

    let slots = sim
        .available_for_production(5, StepWindow::Between(0, 2), LineFilter::Any, true, SlotMethod::Latest)
        .unwrap();

    assert!(slots.is_empty());
    assert!(slots.steps().is_empty());
    assert!(slots.lines().is_empty());
    assert_eq!(snapshot(&sim), before);
}

#[test]
fn test_current_step_is_never_offered() {
    let mut sim = create_simulator(2, 2, 10, 100);

    let slots = sim
        .available_for_production(1, StepWindow::Any, LineFilter::Any, true, SlotMethod::Earliest)
        .unwrap();
    assert_eq!(slots.steps(), &[1]);

    sim.fix_before(5);
    let slots = sim
        .available_for_production(1, StepWindow::Any, LineFilter::Any, true, SlotMethod::Earliest)
        .unwrap();
    assert_eq!(slots.steps(), &[6]);

    // Entirely in the past
    let slots = sim
        .available_for_production(1, StepWindow::Between(0, 5), LineFilter::Any, true, SlotMethod::All)
        .unwrap();
    assert!(slots.is_empty());
}

#[test]
fn test_window_beyond_horizon_is_empty() {
    let sim = create_simulator(2, 2, 10, 100);
    let slots = sim
        .available_for_production(1, StepWindow::At(10), LineFilter::Any, true, SlotMethod::All)
        .unwrap();
    assert!(slots.is_empty());

    // Clipped at the end of the horizon
    let slots = sim
        .available_for_production(1, StepWindow::Between(8, 20), LineFilter::Any, true, SlotMethod::All)
        .unwrap();
    assert_eq!(slots.steps(), &[8, 8, 9, 9]);
}

#[test]
fn test_methods_select_from_both_ends() {
    let sim = create_simulator(3, 2, 10, 100);
    let window = StepWindow::Between(2, 4);

    let earliest = sim
        .available_for_production(4, window, LineFilter::Any, true, SlotMethod::Earliest)
        .unwrap();
    assert_eq!(earliest.iter().collect::<Vec<_>>(), vec![(2, 0), (2, 1), (2, 2), (3, 0)]);

    let latest = sim
        .available_for_production(4, window, LineFilter::Any, true, SlotMethod::Latest)
        .unwrap();
    assert_eq!(latest.iter().collect::<Vec<_>>(), vec![(3, 2), (4, 0), (4, 1), (4, 2)]);

    let all = sim
        .available_for_production(4, window, LineFilter::Any, true, SlotMethod::All)
        .unwrap();
    assert_eq!(all.len(), 9);
}

#[test]
fn test_occupied_cells_need_override() {
    let mut sim = create_simulator(1, 2, 5, 100);
    let slots: ProductionSlots = vec![(2, 0)].into_iter().collect();
    sim.order_production(1, &slots).unwrap();

    let free = sim
        .available_for_production(1, StepWindow::Between(1, 3), LineFilter::Any, false, SlotMethod::All)
        .unwrap();
    assert_eq!(free.steps(), &[1, 3]);

    let any = sim
        .available_for_production(1, StepWindow::Between(1, 3), LineFilter::Any, true, SlotMethod::All)
        .unwrap();
    assert_eq!(any.steps(), &[1, 2, 3]);
}

#[test]
fn test_line_filter() {
    let sim = create_simulator(3, 2, 6, 100);
    let slots = sim
        .available_for_production(2, StepWindow::Any, LineFilter::Line(1), true, SlotMethod::Earliest)
        .unwrap();
    assert_eq!(slots.lines(), &[1, 1]);
    assert_eq!(slots.steps(), &[1, 2]);

    assert_eq!(
        sim.available_for_production(1, StepWindow::Any, LineFilter::Line(3), true, SlotMethod::All),
        Err(SimulatorError::UnknownLine { line: 3, n_lines: 3 })
    );
}

// ============================================================================
// order_production
// ============================================================================

#[test]
fn test_order_production_writes_commands_only() {
    let mut sim = create_simulator(2, 3, 10, 100);
    let before = snapshot(&sim);
    let slots = sim
        .available_for_production(3, StepWindow::Between(4, 6), LineFilter::Line(0), false, SlotMethod::Earliest)
        .unwrap();

    sim.order_production(2, &slots).unwrap();

    assert_eq!(cells_running(&sim, 2), vec![(4, 0), (5, 0), (6, 0)]);
    assert_eq!(sim.ledger().wallet(), before.wallet());
    assert_eq!(sim.inventory_at(9), vec![0, 0, 0, 0]);
}

#[test]
fn test_order_production_validates_before_writing() {
    let mut sim = create_simulator(2, 3, 10, 100);
    sim.fix_before(3);
    let before = snapshot(&sim);

    let slots: ProductionSlots = vec![(5, 0), (2, 1)].into_iter().collect();
    assert_eq!(
        sim.order_production(0, &slots),
        Err(SimulatorError::HistoryFixed {
            step: 2,
            fixed_before: 3,
        })
    );

    let slots: ProductionSlots = vec![(5, 0), (10, 1)].into_iter().collect();
    assert_eq!(
        sim.order_production(0, &slots),
        Err(SimulatorError::StepOutOfHorizon {
            step: 10,
            n_steps: 10,
        })
    );

    let slots: ProductionSlots = vec![(5, 0)].into_iter().collect();
    assert_eq!(
        sim.order_production(3, &slots),
        Err(SimulatorError::UnknownProcess {
            process: 3,
            n_processes: 3,
        })
    );

    assert_eq!(snapshot(&sim), before);
}

// ============================================================================
// schedule
// ============================================================================

#[test]
fn test_schedule_three_units_in_window() {
    let mut sim = create_simulator(10, 5, 50, 1000);

    let request = ScheduleRequest::new(0, 3).in_window(StepWindow::Between(5, 10));
    assert!(sim.schedule(&request).unwrap());

    let cells = cells_running(&sim, 0);
    assert_eq!(cells.len(), 3);
    assert!(cells.iter().all(|&(step, _)| (5..=10).contains(&step)));

    // Between includes both ends, so step 10 is a candidate and Latest
    // takes its last three lines
    assert_eq!(cells, vec![(10, 7), (10, 8), (10, 9)]);
    assert_eq!(sim.wallet_at(9), 1000);
    assert_eq!(sim.wallet_at(10), 997);
    assert_eq!(sim.final_balance(), 997);
    assert_eq!(sim.inventory_at(9)[..2], [0, 0]);
    assert_eq!(sim.inventory_at(49)[..2], [-3, 3]);
    assert_eq!(sim.bookmark_depth(), 0);
}

#[test]
fn test_schedule_earliest() {
    let mut sim = create_simulator(10, 5, 50, 1000);
    let request = ScheduleRequest::new(0, 3)
        .in_window(StepWindow::Between(5, 10))
        .with_method(SlotMethod::Earliest);
    assert!(sim.schedule(&request).unwrap());

    let cells = cells_running(&sim, 0);
    assert!(cells.iter().all(|&(step, _)| (5..=10).contains(&step)));
    assert_eq!(cells, vec![(5, 0), (5, 1), (5, 2)]);
    assert_eq!(sim.wallet_at(4), 1000);
    assert_eq!(sim.wallet_at(5), 997);
}

#[test]
fn test_schedule_spread_over_steps() {
    let mut sim = create_simulator(1, 1, 6, 100);
    let request = ScheduleRequest::new(0, 3).with_method(SlotMethod::Earliest);
    assert!(sim.schedule(&request).unwrap());

    assert_eq!(cells_running(&sim, 0), vec![(1, 0), (2, 0), (3, 0)]);
    assert_eq!(sim.wallet_to(5), &[100, 99, 98, 97, 97, 97]);
    assert_eq!(sim.inventory_to(5)[1], &[0, 1, 2, 3, 3, 3]);
}

#[test]
fn test_schedule_on_one_line() {
    let mut sim = create_simulator(3, 2, 10, 100);
    let request = ScheduleRequest::new(1, 2).on_line(LineFilter::Line(1));
    assert!(sim.schedule(&request).unwrap());

    let cells = cells_running(&sim, 1);
    assert_eq!(cells.len(), 2);
    assert!(cells.iter().all(|&(_, line)| line == 1));
}

#[test]
fn test_schedule_not_enough_slots_fails_cleanly() {
    let mut sim = create_simulator(1, 2, 5, 100);
    assert!(sim
        .schedule(&ScheduleRequest::new(1, 1).in_window(StepWindow::At(3)))
        .unwrap());
    let before = snapshot(&sim);

    // Steps 1, 2 and 4 are free, step 3 is taken
    let request = ScheduleRequest::new(0, 4).with_override(false);
    assert!(!sim.schedule(&request).unwrap());
    assert_eq!(snapshot(&sim), before);

    // Allowed to take over step 3 as well
    let request = ScheduleRequest::new(0, 4).with_override(true);
    assert!(sim.schedule(&request).unwrap());
    assert_eq!(cells_running(&sim, 0), vec![(1, 0), (2, 0), (3, 0), (4, 0)]);
    assert!(cells_running(&sim, 1).is_empty());
}

#[test]
fn test_schedule_money_shortage_fails_upfront() {
    let mut sim = create_simulator(2, 2, 10, 0);
    let before = snapshot(&sim);

    let request = ScheduleRequest::new(0, 1).check_money();
    assert!(!sim.schedule(&request).unwrap());
    assert_eq!(snapshot(&sim), before);

    // Same request is fine when shortages are tolerated
    assert!(sim.schedule(&ScheduleRequest::new(0, 1)).unwrap());
    assert_eq!(sim.final_balance(), -1);
}

#[test]
fn test_schedule_money_runs_out_midway() {
    // Enough for two runs, not three
    let mut sim = create_simulator(1, 1, 6, 2);
    let before = snapshot(&sim);

    let request = ScheduleRequest::new(0, 3)
        .with_method(SlotMethod::Earliest)
        .check_money();
    assert!(!sim.schedule(&request).unwrap());
    assert_eq!(snapshot(&sim), before);
    assert_eq!(sim.bookmark_depth(), 0);
}

#[test]
fn test_schedule_inventory_shortage_rolls_back() {
    // Two units of input for three runs
    let mut sim = with_inventory(1, 6, 100, vec![2, 0]);
    let before = snapshot(&sim);

    let request = ScheduleRequest::new(0, 3)
        .with_method(SlotMethod::Earliest)
        .check_inventory();
    assert!(!sim.schedule(&request).unwrap());
    assert_eq!(snapshot(&sim), before);

    let request = ScheduleRequest::new(0, 2)
        .with_method(SlotMethod::Earliest)
        .check_inventory();
    assert!(sim.schedule(&request).unwrap());
    assert_eq!(sim.inventory_at(5), vec![0, 2]);
}

#[test]
fn test_schedule_zero_quantity_is_a_no_op() {
    let mut sim = create_simulator(2, 2, 10, 100);
    let before = snapshot(&sim);
    assert!(sim.schedule(&ScheduleRequest::new(0, 0)).unwrap());
    assert_eq!(snapshot(&sim), before);
}

#[test]
fn test_schedule_contract_violations() {
    let mut sim = create_simulator(2, 2, 10, 100);
    assert_eq!(
        sim.schedule(&ScheduleRequest::new(2, 1)),
        Err(SimulatorError::UnknownProcess {
            process: 2,
            n_processes: 2,
        })
    );
    assert_eq!(
        sim.schedule(&ScheduleRequest::new(0, 1).on_line(LineFilter::Line(7))),
        Err(SimulatorError::UnknownLine { line: 7, n_lines: 2 })
    );
}

#[test]
fn test_slot_search_through_trait_object() {
    let mut sim = create_simulator(2, 2, 8, 100);
    let factory: &mut dyn FactorySimulator = &mut sim;

    let slots = factory
        .available_for_production(2, StepWindow::Between(3, 4), LineFilter::Line(1), false, SlotMethod::Earliest)
        .unwrap();
    assert_eq!(slots.steps(), &[3, 4]);
    assert_eq!(slots.lines(), &[1, 1]);
    factory.order_production(1, &slots).unwrap();

    assert_eq!(cells_running(&sim, 1), vec![(3, 1), (4, 1)]);
    assert_eq!(sim.final_balance(), 100);
}

// ============================================================================
// Overrides
// ============================================================================

#[test]
fn test_override_scheduled_cell_reverts_its_run() {
    let mut sim = create_simulator(1, 2, 6, 100);
    let on_step_3 = |process| {
        ScheduleRequest::new(process, 1)
            .in_window(StepWindow::At(3))
            .on_line(LineFilter::Line(0))
    };
    assert!(sim.schedule(&on_step_3(1)).unwrap());
    assert!(sim.schedule(&on_step_3(0)).unwrap());

    // Only the replacing run is left in the ledger
    assert_eq!(cells_running(&sim, 0), vec![(3, 0)]);
    assert_eq!(sim.final_balance(), 99);
    assert_eq!(sim.inventory_at(5), vec![-1, 1, 0]);
}

#[test]
fn test_override_ordered_cell_reverts_nothing() {
    let profile = FactoryProfile::uniform(1, 2, 6, 5);
    let mut sim = Simulator::new(profile, SimulatorConfig::with_balance(100)).unwrap();
    let slots: ProductionSlots = vec![(3, 0)].into_iter().collect();
    sim.order_production(1, &slots).unwrap();
    assert_eq!(sim.final_balance(), 100);

    assert!(sim
        .schedule(&ScheduleRequest::new(0, 1).in_window(StepWindow::At(3)).on_line(LineFilter::Line(0)))
        .unwrap());

    assert_eq!(cells_running(&sim, 0), vec![(3, 0)]);
    assert_eq!(sim.final_balance(), 95);
    assert_eq!(sim.inventory_at(5), vec![-1, 1, 0]);
}

#[test]
fn test_reordering_a_scheduled_cell_keeps_its_effects() {
    let mut sim = create_simulator(1, 2, 6, 100);
    assert!(sim
        .schedule(&ScheduleRequest::new(0, 1).in_window(StepWindow::At(2)))
        .unwrap());
    let slots: ProductionSlots = vec![(2, 0)].into_iter().collect();
    sim.order_production(1, &slots).unwrap();

    // The cell now names process 1, but the booked run of process 0 stays
    assert!(!sim.ledger().is_modeled(0, 2));
    assert_eq!(sim.final_balance(), 99);

    // Taking the cell back books a second run and reverts nothing
    assert!(sim
        .schedule(&ScheduleRequest::new(0, 1).in_window(StepWindow::At(2)))
        .unwrap());
    assert!(sim.ledger().is_modeled(0, 2));
    assert_eq!(sim.final_balance(), 98);
    assert_eq!(sim.inventory_at(5), vec![-2, 2, 0]);
}

#[test]
fn test_schedule_request_from_json() {
    let request: ScheduleRequest =
        serde_json::from_str(r#"{"process": 1, "quantity": 2, "window": {"between": [3, 4]}}"#).unwrap();
    assert_eq!(request.window, StepWindow::Between(3, 4));
    assert_eq!(request.line, LineFilter::Any);
    assert_eq!(request.method, SlotMethod::Latest);
    assert!(request.override_commands);
    assert!(request.ignore_inventory_shortage);
    assert!(request.ignore_money_shortage);
}
