//! In-process simulation: three personas train concurrently against one store.

use std::sync::Arc;

use fallguard_fl::{
    ClientRoundRunner, DenseTrainer, GlobalModelStore, MergePolicy, Persona, RunnerSettings,
};

#[tokio::main]
async fn main() {
    println!("Federated Fall Detection: in-process simulation\n");

    let store = Arc::new(GlobalModelStore::new(MergePolicy::RunningAverage));
    let trainer = Arc::new(DenseTrainer::default());

    let mut handles = Vec::new();
    for (i, persona) in Persona::ALL.into_iter().enumerate() {
        let settings = RunnerSettings {
            client_id: Some(format!("{}-wrist", persona)),
            seed: Some(100 + i as u64),
            ..RunnerSettings::default()
        };
        let runner = ClientRoundRunner::new(Arc::clone(&store), Arc::clone(&trainer), settings);
        handles.push(tokio::spawn(async move {
            let mut reports = Vec::new();
            for _ in 0..3 {
                match runner.run_round(persona).await {
                    Ok(report) => reports.push(report),
                    Err(e) => println!("{} round failed: {}", persona, e),
                }
            }
            reports
        }));
    }

    for handle in handles {
        let reports = handle.await.expect("client task panicked");
        for r in reports {
            println!(
                "{:<8} {:<15} round {:>2} -> {:>2}  local FPR {:>5.2}%  loss {:.4}",
                r.persona.to_string(),
                r.client_id,
                r.fetched_round,
                r.new_round,
                r.local_fpr * 100.0,
                r.final_loss
            );
        }
    }

    let state = store.fetch();
    println!(
        "\nGlobal model: round {}, {} contributions, signature {}",
        state.round,
        state.contributions,
        state.params.signature()
    );
}
