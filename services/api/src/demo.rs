use crate::infra::InMemoryNotificationOutbox;
use blind_hire::config::MatchingConfig;
use blind_hire::error::AppError;
use blind_hire::workflows::matching::{
    CandidateId, CandidateRegistration, CandidateView, CompanyId, CompanyRegistration,
    IdentityProfile, InMemoryMatchingStore, JobId, MatchingError, MatchingService, MatchingStore,
    PipelineStage, RegisteredCandidate,
};
use blind_hire::workflows::scores::{ImportSummary, VerifiedScoreImporter};
use clap::Args;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = MatchingService<InMemoryMatchingStore, InMemoryNotificationOutbox>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Assessment export (Candidate Handle,Skill,Score,Assessed At) to import mid-scenario.
    /// Defaults to a generated export for the demo candidate.
    #[arg(long)]
    pub(crate) scores_csv: Option<PathBuf>,
    /// Stop after the hire conflict instead of reactivating the candidate.
    #[arg(long)]
    pub(crate) skip_reactivation: bool,
}

struct DemoWorld {
    service: DemoService,
    store: Arc<InMemoryMatchingStore>,
    outbox: Arc<InMemoryNotificationOutbox>,
}

impl DemoWorld {
    fn new() -> Self {
        let store = Arc::new(InMemoryMatchingStore::default());
        let outbox = Arc::new(InMemoryNotificationOutbox::default());
        let service = MatchingService::new(
            store.clone(),
            outbox.clone(),
            MatchingConfig::default(),
        );
        Self {
            service,
            store,
            outbox,
        }
    }

    fn company(&self, name: &str) -> Result<CompanyId, AppError> {
        let company = self.service.jobs().register_company(CompanyRegistration {
            legal_name: format!("{name} Ltda."),
            trade_name: name.to_string(),
            sector: "software".to_string(),
        })?;
        Ok(company.id)
    }

    fn open_job(&self, company: &CompanyId, title: &str) -> Result<JobId, AppError> {
        let job = self.service.jobs().post_job(company, title)?;
        self.service.jobs().open_job(company, &job.id)?;
        Ok(job.id)
    }

    fn candidate(&self) -> Result<RegisteredCandidate, AppError> {
        let mut competencies = BTreeMap::new();
        competencies.insert("rust".to_string(), 5);
        competencies.insert("postgres".to_string(), 3);
        competencies.insert("kubernetes".to_string(), 2);
        let registered = self.service.vault().register(CandidateRegistration {
            identity: IdentityProfile {
                full_name: "Xavier Prado".to_string(),
                email: "xavier.prado@example.com".to_string(),
                phone: Some("+55 11 5555-0100".to_string()),
                documents: Vec::new(),
            },
            competencies,
        })?;
        Ok(registered)
    }

    fn stage_of(&self, candidate: &CandidateId, job: &JobId) -> Result<String, AppError> {
        let stage = self
            .store
            .application_for(candidate, job)
            .map_err(MatchingError::from)?
            .map(|application| application.stage.to_string())
            .unwrap_or_else(|| "none".to_string());
        Ok(stage)
    }

    fn visibility(&self, candidate: &CandidateId) -> Result<&'static str, AppError> {
        let visibility = self
            .store
            .candidate(candidate)
            .map_err(MatchingError::from)?
            .map(|record| record.visibility.label())
            .unwrap_or("unknown");
        Ok(visibility)
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        scores_csv,
        skip_reactivation,
    } = args;

    println!("Blind hiring demo");
    let world = DemoWorld::new();
    let service = &world.service;

    let acme = world.company("Acme")?;
    let globex = world.company("Globex")?;
    let backend = world.open_job(&acme, "Backend engineer")?;
    let platform = world.open_job(&globex, "Platform engineer")?;
    let xavier = world.candidate()?;
    let candidate_id = &xavier.candidate_id;
    println!("- Acme opened {backend}, Globex opened {platform}");

    println!("\nAnonymous pool");
    for entry in service.browse(None)? {
        let skills: Vec<_> = entry
            .competencies
            .iter()
            .map(|summary| format!("{} {}/5", summary.skill, summary.declared_level))
            .collect();
        println!("  - {} | {}", entry.handle, skills.join(", "));
    }

    let summary = match scores_csv {
        Some(path) => {
            println!("\nImporting verified scores from {}", path.display());
            VerifiedScoreImporter::from_path(path, service)?
        }
        None => {
            let export = format!(
                "Candidate Handle,Skill,Score,Assessed At\n{},Rust,92,2025-10-01\n",
                xavier.handle
            );
            println!("\nImporting a generated assessment export");
            VerifiedScoreImporter::from_reader(Cursor::new(export), service)?
        }
    };
    render_import(&summary);

    println!("\nAcme expresses interest in {} for {backend}", xavier.handle);
    let interest = service.express_interest(&acme, &xavier.handle, &backend)?;
    render_view(
        "Acme before consent",
        &service.resolve_candidate(&acme, &xavier.handle, &backend)?,
    );

    for entry in service.interest().inbox(candidate_id)? {
        println!(
            "  Candidate inbox: {} wants to talk about {}",
            entry.company, entry.job_title
        );
    }
    let resolution = service.interest().accept(candidate_id, &interest.id)?;
    println!(
        "- Candidate accepted; consent {} and application moved to {}",
        resolution.consent, resolution.stage
    );
    render_view(
        "Acme after consent",
        &service.resolve_candidate(&acme, &xavier.handle, &backend)?,
    );

    let application = service
        .applications_for_job(&acme, &backend)?
        .into_iter()
        .next()
        .map(|summary| summary.application_id);
    let Some(application_id) = application else {
        println!("  Acme has no application on {backend}; stopping");
        return Ok(());
    };
    service.pipeline().move_stage(
        &acme,
        &application_id,
        PipelineStage::Interview,
        PipelineStage::Finalist,
    )?;
    println!("- Acme moved {application_id} to finalist");

    let globex_interest = service.express_interest(&globex, &xavier.handle, &platform)?;
    service.interest().accept(candidate_id, &globex_interest.id)?;
    println!(
        "- Globex also got consent; {platform} is at {}",
        world.stage_of(candidate_id, &platform)?
    );

    println!("\nAcme hires the candidate");
    let hire = service.hires().hire_application(&acme, &application_id)?;
    println!("- Hire {} recorded at {}", hire.id, hire.hired_at.to_rfc3339());
    println!("  {backend}: {}", world.stage_of(candidate_id, &backend)?);
    println!("  {platform}: {}", world.stage_of(candidate_id, &platform)?);
    println!("  Profile visibility: {}", world.visibility(candidate_id)?);
    render_view(
        "Globex after the hire",
        &service.resolve_candidate(&globex, &xavier.handle, &platform)?,
    );

    match service.hires().mark_hired(candidate_id, &platform, &globex) {
        Ok(record) => println!("  Unexpected second hire {}", record.id),
        Err(err) => println!("- Globex hire attempt refused: {} ({})", err, err.code()),
    }

    if !skip_reactivation {
        println!("\nCandidate reactivates the profile");
        let closed = service.hires().reactivate(candidate_id)?;
        println!(
            "- Hire {} closed; visibility {}",
            closed.id,
            world.visibility(candidate_id)?
        );
        println!(
            "  {platform} stays {}",
            world.stage_of(candidate_id, &platform)?
        );
    }

    let notices = world.outbox.events();
    if notices.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications");
        for notice in notices {
            let recipient = serde_json::to_string(&notice.recipient)
                .unwrap_or_else(|_| "unknown recipient".to_string());
            println!("  - {} -> {}", notice.template, recipient);
        }
    }

    Ok(())
}

fn render_import(summary: &ImportSummary) {
    println!("- {} score rows applied", summary.applied);
    for skipped in &summary.skipped {
        println!("  line {} skipped: {}", skipped.line, skipped.reason);
    }
}

fn render_view(label: &str, view: &CandidateView) {
    match view {
        CandidateView::Anonymous(candidate) => {
            println!("  {label}: anonymous {}", candidate.handle);
        }
        CandidateView::Disclosed(candidate) => {
            println!(
                "  {label}: {} <{}>",
                candidate.identity.full_name, candidate.identity.email
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn demo_world_tracks_the_hire_cascade() {
        let world = DemoWorld::new();
        let acme = world.company("Acme").expect("company");
        let job = world.open_job(&acme, "Backend engineer").expect("job");
        let candidate = world.candidate().expect("candidate");

        let interest = world
            .service
            .express_interest(&acme, &candidate.handle, &job)
            .expect("interest");
        world
            .service
            .interest()
            .accept(&candidate.candidate_id, &interest.id)
            .expect("accepted");
        let application = world
            .service
            .applications_for_job(&acme, &job)
            .expect("applications")
            .remove(0);
        world
            .service
            .pipeline()
            .move_stage(
                &acme,
                &application.application_id,
                PipelineStage::Interview,
                PipelineStage::Finalist,
            )
            .expect("finalist");
        world
            .service
            .hires()
            .mark_hired(&candidate.candidate_id, &job, &acme)
            .expect("hired");

        assert_eq!(
            world.stage_of(&candidate.candidate_id, &job).expect("stage"),
            "hired"
        );
        assert_eq!(
            world.visibility(&candidate.candidate_id).expect("visibility"),
            "suspended"
        );
        assert!(!world.outbox.events().is_empty());
    }
}
