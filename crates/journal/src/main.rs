use chrono::Utc;
use color_eyre::eyre;
use structopt::StructOpt;
use tracing::info;

use journal::analytics::AnalyticsReport;
use journal::config::Config;
use journal::metrics::{AnalyticsFilter, Period};
use journal::record::{SqliteJournalStore, TradeStore, UserStore};

// lib.rs에서 자동으로 dotenv가 로드됨

#[derive(Debug, StructOpt)]
#[structopt(name = "journal", about = "트레이딩 저널 서버")]
enum Command {
    /// HTTP API 서버 실행
    Serve {
        /// JOURNAL_API_PORT 대신 사용할 포트
        #[structopt(long)]
        port: Option<u16>,
    },
    /// 사용자 분석 리포트 출력
    Report {
        #[structopt(long)]
        user: String,
        /// all, 7d, 30d, 30t
        #[structopt(long, default_value = "all")]
        period: Period,
        #[structopt(long)]
        strategy: Vec<String>,
        #[structopt(long)]
        ticker: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    // init logging (설정보다 먼저)
    let _guards = journal::logger::init_tracing(&journal::config::log_dir_from_env());

    let mut config = Config::from_env();

    match Command::from_args() {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.api_port = port;
            }
            info!("Starting journal API on port {}", config.api_port);
            journal::server::start_server(&config).await
        }
        Command::Report {
            user,
            period,
            strategy,
            ticker,
        } => {
            let filter = AnalyticsFilter {
                period,
                strategies: strategy.into_iter().collect(),
                tickers: ticker.into_iter().collect(),
            };
            run_report(&config, &user, filter).await
        }
    }
}

async fn run_report(config: &Config, user_id: &str, filter: AnalyticsFilter) -> eyre::Result<()> {
    let store = SqliteJournalStore::open(&config.db_path)
        .await
        .map_err(|e| eyre::eyre!("거래 기록 저장소 열기 실패: {}", e))?;

    let profile = store
        .get_user(user_id)
        .await
        .map_err(|e| eyre::eyre!("사용자 조회 실패: {}", e))?
        .ok_or_else(|| eyre::eyre!("존재하지 않는 사용자: {}", user_id))?;
    let history = store
        .query_all(user_id)
        .await
        .map_err(|e| eyre::eyre!("거래 기록 조회 실패: {}", e))?;

    let report = AnalyticsReport::build(&history, profile.is_premium, filter, Utc::now());
    print_report(user_id, &report);
    Ok(())
}

fn print_report(user_id: &str, report: &AnalyticsReport) {
    let m = &report.metrics;
    println!("=== {} ({}) ===", user_id, report.filter.period);
    if let Some(banner) = &report.history_banner {
        println!("{}", banner);
    }
    println!("Trades:          {}", m.trade_count);
    println!("Total profit:    {:.2}", m.total_profit);
    println!("Win rate:        {:.1}%", m.win_rate);
    println!("Avg win / loss:  {:.2} / {:.2}", m.avg_win, m.avg_loss);
    println!("P/L ratio:       {:.2}", m.pl_ratio);
    println!("Avg holding:     {:.0}m", m.avg_holding_minutes);
    println!("Current balance: {:.2}", m.current_balance);
    println!(
        "Results:         Win {} / Break-even {} / Loss {}",
        m.result_counts.win, m.result_counts.break_even, m.result_counts.loss
    );

    println!("\n--- Holding time ---");
    for b in &m.duration_buckets {
        println!(
            "{:>7}  {:>3} trades  win {:>5.1}%",
            b.bucket.label(),
            b.trades,
            b.win_rate
        );
    }

    println!("\n--- History ---");
    for row in &report.table {
        println!(
            "{}  {:<12} {:<12} {:<10} {:>10.2} {:>7.2}%",
            row.entry_time.format("%Y-%m-%d %H:%M"),
            row.ticker,
            row.strategy_name,
            row.result_status,
            row.profit,
            row.roi
        );
    }

    if report.unlock_prompt {
        println!(
            "\n{} older trades are archived. Submit your exchange UID to unlock the full history.",
            report.locked_count
        );
    }
}
