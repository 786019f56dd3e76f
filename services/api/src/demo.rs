use crate::infra::{assemble_service, parse_category, SeedStaffDirectory};
use chrono::{Duration, Utc};
use clap::Args;
use tenant_maintenance::config::MaintenanceConfig;
use tenant_maintenance::error::AppError;
use tenant_maintenance::workflows::maintenance::{
    ArchiveViewer, IssueCategory, MaintenanceRequest, RequestCosts, RequestDraft, StaffMember,
    UserAccount, UserRole,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Issue category for the demo request (e.g. plumbing, pest_control, emergency)
    #[arg(long, default_value = "plumbing", value_parser = parse_category)]
    pub(crate) category: IssueCategory,
    /// Free-text description filed by the demo tenant
    #[arg(long, default_value = "Kitchen faucet dripping constantly")]
    pub(crate) description: String,
    /// Stop after completion instead of reopening the request
    #[arg(long)]
    pub(crate) skip_reopen: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = MaintenanceConfig::default();
    let directory = SeedStaffDirectory::builtin(&config);
    let (service, notifications) = assemble_service(&directory, config)?;

    let tenant = UserAccount {
        id: "tenant-demo".to_string(),
        display_name: "Riley Jordan".to_string(),
        contact: "riley.jordan@example.com".to_string(),
        role: UserRole::Tenant {
            unit: "A-201".to_string(),
        },
    };

    println!("Maintenance request demo");
    let request = service.submit(
        &tenant,
        RequestDraft {
            unit: String::new(),
            description: args.description,
            category: args.category,
        },
    )?;
    println!(
        "Submitted {} for unit {} ({} -> priority {})",
        request.id,
        request.unit,
        request.category.label(),
        request.priority.label()
    );

    println!("\nAvailable staff");
    let candidates = service.list_available();
    for member in &candidates {
        println!(
            "- {:<12} {:<28} {}/{}",
            member.id.0, member.display_name, member.current_workload, member.max_capacity
        );
    }
    let Some(assignee) = candidates.first().map(|member| member.id.clone()) else {
        println!("No staff available; leaving the request in the queue");
        return Ok(());
    };

    let request = service.assign(&request.id, &assignee)?;
    print_step("Assigned", &request);
    let request = service.schedule(&request.id, Utc::now() + Duration::hours(4))?;
    if let Some(when) = request.scheduled_for {
        println!("  Visit scheduled for {}", when.format("%Y-%m-%d %H:%M UTC"));
    }
    let request = service.start_work(&request.id)?;
    print_step("Started", &request);
    service.record_costs(
        &request.id,
        RequestCosts {
            estimated_cents: Some(8_500),
            actual_cents: Some(7_240),
        },
    )?;
    let request = service.complete(&request.id, "Replaced faucet cartridge and washers")?;
    print_step("Completed", &request);
    print_workload(&service.staff_roster());

    let request = service.archive(&request.id, ArchiveViewer::Tenant)?;
    println!(
        "  Tenant archived the request; tenant view now lists {} active request(s)",
        service.active_for_tenant(&request.tenant_id)?.len()
    );

    if !args.skip_reopen {
        let request = service.reopen(&request.id, None, Some("Dripping again after a week"))?;
        print_step("Reopened", &request);
        println!(
            "  Archive flags reset: tenant={}, staff={}",
            request.archive.tenant_archived, request.archive.staff_archived
        );
        print_workload(&service.staff_roster());
        print_notes(&request);
    }

    let sent = notifications.sent();
    println!("\nTenant notifications ({})", sent.len());
    for notification in sent {
        println!(
            "- {} -> {}: {}",
            notification.request_id, notification.recipient, notification.status
        );
    }

    let latest = service.get(&request.id)?;
    match serde_json::to_string_pretty(&latest.summary_view()) {
        Ok(json) => println!("\nPublic status payload:\n{}", json),
        Err(err) => println!("\nPublic status payload unavailable: {}", err),
    }

    Ok(())
}

fn print_step(label: &str, request: &MaintenanceRequest) {
    let staff = request
        .assigned_staff
        .as_ref()
        .map(|id| id.0.as_str())
        .unwrap_or("unassigned");
    println!("{label}: {} is {} ({staff})", request.id, request.status);
}

fn print_workload(members: &[StaffMember]) {
    println!("  Workload:");
    for member in members {
        println!(
            "    {:<12} {}/{}{}",
            member.id.0,
            member.current_workload,
            member.max_capacity,
            if member.available { "" } else { " (away)" }
        );
    }
}

fn print_notes(request: &MaintenanceRequest) {
    if request.notes.is_empty() {
        return;
    }
    println!("  Notes:");
    for note in &request.notes {
        println!("    [{}] {}", note.status, note.text);
    }
}
