mod config;
mod pddl;
mod sexpr;

use std::fs;

use anyhow::{Context, Result};
use structopt::StructOpt;

use pocl_domain::SearchExhaustionReason;
use pocl_planning_graph::PlanningGraph;
use pocl_search::{search, SearchOutcome};

use config::Opt;

fn init_tracing(opt: &Opt) {
    let level = match opt.verbosity().max(opt.warn_verbosity()) {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_tracing(&opt);

    let domain_src = fs::read_to_string(&opt.domain).with_context(|| format!("reading domain file {}", opt.domain.display()))?;
    let problem_src = fs::read_to_string(&opt.problem).with_context(|| format!("reading problem file {}", opt.problem.display()))?;
    let mut problem = pddl::read(&domain_src, &problem_src).context("parsing domain/problem")?;

    if let Some(t) = opt.temporal_tolerance {
        problem.temporal_tolerance = t;
    }
    problem.check_constant_durations().context("checking action durations")?;

    let graph = PlanningGraph::build(&problem);
    let config = opt.search_config()?;

    match search(&problem, &graph, &config)? {
        SearchOutcome::Complete(plan) => {
            let (schedule, makespan) = plan.schedule();
            println!("Makespan: {makespan}");
            let mut lines: Vec<(f64, String)> = schedule
                .iter()
                .map(|&(step_id, start, end)| {
                    let step = plan.step(step_id).expect("scheduled step exists in the plan");
                    let action = problem.action(step.action);
                    let args: Vec<String> = action
                        .params
                        .iter()
                        .map(|(v, _)| {
                            plan.bindings
                                .domain(*v, step.id)
                                .and_then(|d| d.into_iter().next())
                                .map(|o| problem.terms.object_name(o).to_string())
                                .unwrap_or_else(|| "?".to_string())
                        })
                        .collect();
                    let header = if args.is_empty() { action.name.clone() } else { format!("{} {}", action.name, args.join(" ")) };
                    (start, format!("{start}: ({header})[{}]", end - start))
                })
                .collect();
            lines.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            for (_, line) in lines {
                println!("{line}");
            }
            if opt.verbosity() >= 2 {
                print_verbose(&plan, &problem);
            }
        }
        SearchOutcome::Exhausted(reason) => {
            println!("no plan");
            let comment = match reason {
                SearchExhaustionReason::NoPlan => "Problem has no solution.",
                SearchExhaustionReason::SearchLimitReached => "Search limit reached.",
            };
            println!(";{comment}");
        }
    }

    Ok(())
}

fn print_verbose(plan: &pocl_plan::Plan, problem: &pocl_domain::Problem) {
    println!("--- steps ---");
    for step in plan.steps.iter() {
        println!("{}: {}", step.id, problem.action(step.action).name);
    }
    println!("--- links ---");
    for link in plan.links.iter() {
        println!("{} -> {} : {:?}", link.from, link.to, link.condition);
    }
    println!("--- open conditions ---");
    for oc in plan.open_conditions.iter() {
        println!("step {}: {:?} @ {:?}", oc.step, oc.formula, oc.when);
    }
    println!("--- unsafes ---");
    for u in plan.unsafes.iter() {
        println!("step {} threatens link {} -> {}", u.step, u.link.from, u.link.to);
    }
    println!("--- bindings ---");
    for vs in plan.bindings.varsets() {
        println!("{:?}", vs);
    }
    println!("--- orderings ---");
    for (step_id, start, end) in plan.orderings.minimal_network(&plan.real_step_ids()) {
        println!("{step_id}: [{start}, {end}]");
    }
}
