//! plan / apply / read / destroy against an offline device snapshot.

use anyhow::{bail, Context, Result};
use polsync_audit::{AuditWriter, PassRecorder};
use polsync_device_offline::OfflineDevice;
use polsync_execution::{ReconcileError, RuleBaseUnit};
use polsync_model::RuleList;
use polsync_reconcile::Plan;

use super::{load_rules_doc, load_settings, open_device, save_device};
use crate::TargetArgs;

fn open_unit<'d>(
    target: &TargetArgs,
    device: &'d OfflineDevice,
) -> Result<(RuleBaseUnit<&'d OfflineDevice>, Option<String>, polsync_config::Settings)> {
    let (settings, config_hash) = load_settings(&target.config_paths)?;
    let unit = RuleBaseUnit::from_id(device, &target.id)?
        .with_validation(settings.validation)
        .with_diff_options(settings.diff);
    Ok((unit, config_hash, settings))
}

fn print_plan(plan: &Plan) {
    println!("plan_ops={}", plan.len());
    println!("plan_summary={}", plan.summary());
    for (i, op) in plan.iter().enumerate() {
        println!("op[{i}]={op}");
    }
}

pub fn plan(target: &TargetArgs, rules_path: &str, json: bool, fail_on_drift: bool) -> Result<()> {
    let declared = load_rules_doc(rules_path)?;
    let device = open_device(&target.device)?;
    let (unit, _, _) = open_unit(target, &device)?;

    let plan = unit.plan(&declared)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("serialize plan failed")?
        );
    } else {
        println!("id={}", unit.id());
        print_plan(&plan);
    }

    if fail_on_drift && !plan.is_empty() {
        bail!("DRIFT_DETECTED: {} ({})", unit.id(), plan.summary());
    }
    Ok(())
}

pub fn apply(target: &TargetArgs, rules_path: &str, audit: Option<String>) -> Result<()> {
    let declared = load_rules_doc(rules_path)?;
    run_pass(target, Some(declared), audit)
}

pub fn destroy(target: &TargetArgs, audit: Option<String>) -> Result<()> {
    run_pass(target, None, audit)
}

pub fn read(target: &TargetArgs, json: bool) -> Result<()> {
    let device = open_device(&target.device)?;
    let (unit, _, _) = open_unit(target, &device)?;

    let observed = unit.read()?;
    if json {
        let rules = observed.unwrap_or_else(RuleList::empty);
        println!(
            "{}",
            serde_json::to_string_pretty(&rules).context("serialize rules failed")?
        );
        return Ok(());
    }

    println!("id={}", unit.id());
    match observed {
        None => println!("found=false"),
        Some(rules) => {
            println!("found=true");
            println!("rules={}", rules.len());
            for (i, r) in rules.rules().iter().enumerate() {
                println!("rule[{i}]={} action={}", r.name, r.action);
            }
        }
    }
    Ok(())
}

/// One reconciliation pass. `declared = None` tears the rule base down.
///
/// The device snapshot is saved even when the pass fails: ops that were
/// applied stay applied, exactly as on a real device. A declaration
/// rejected before any remote call leaves the snapshot untouched.
fn run_pass(target: &TargetArgs, declared: Option<RuleList>, audit: Option<String>) -> Result<()> {
    let device = open_device(&target.device)?;
    let (mut unit, config_hash, settings) = open_unit(target, &device)?;
    let operation = if declared.is_some() { "apply" } else { "destroy" };

    let mut writer = match audit.or(settings.audit.path) {
        Some(p) => Some(AuditWriter::resume(&p, settings.audit.hash_chain)?),
        None => None,
    };
    let mut recorder = writer
        .as_mut()
        .map(|w| PassRecorder::new(w, unit.id(), config_hash.clone()));

    if let Some(rec) = recorder.as_mut() {
        let preview = unit.plan(declared.as_ref().unwrap_or(&RuleList::empty()))?;
        rec.started(operation, &preview)?;
    }

    let mut audit_err: Option<anyhow::Error> = None;
    let on_applied = |pos: usize, op: &polsync_reconcile::PlanOp| {
        if let Some(rec) = recorder.as_mut() {
            if let Err(e) = rec.op_applied(pos, op) {
                audit_err.get_or_insert(e);
            }
        }
    };

    let result = match &declared {
        Some(rules) => unit.update_with(rules, on_applied),
        None => unit.delete_with(on_applied),
    };

    let rejected_upfront = matches!(
        result,
        Err(ReconcileError::Validation(_) | ReconcileError::Identifier(_))
    );
    if !rejected_upfront {
        save_device(&device, &target.device)?;
    }

    if let Some(rec) = recorder.as_mut() {
        match &result {
            Ok(report) => rec.converged(report.plan.len(), report.observed.len())?,
            Err(e) => rec.failed(&e.to_string())?,
        };
    }
    if let Some(e) = audit_err {
        return Err(e.context("audit write failed"));
    }

    let report = result?;
    println!("id={}", unit.id());
    println!("operation={operation}");
    println!("changed={}", report.changed());
    print_plan(&report.plan);
    println!("rules={}", report.observed.len());
    if let Some(h) = config_hash {
        println!("config_hash={h}");
    }
    if let Some(w) = writer.as_ref() {
        println!("audit_path={}", w.path().display());
    }
    Ok(())
}
