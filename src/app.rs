use std::sync::Arc;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

use outreach_api::create_app;
use outreach_core::config::AppConfig;
use outreach_core::traits::{
    CallAttemptRepository, LeadRepository, MessageGateway, VoiceDispatchGateway,
};
use outreach_dispatcher::{
    CallEventService, LeadIntakeService, RetryScheduler, SweepRunner, SweepService, ThreadRandom,
};
use outreach_infrastructure::{
    HttpMessageGateway, HttpVoiceGateway, SqliteCallAttemptRepository, SqliteLeadRepository,
};

/// 应用运行模式
#[derive(Debug, Clone, Copy)]
pub enum AppMode {
    /// 仅运行API服务器
    Api,
    /// 仅运行周期扫描
    Sweeper,
    /// 运行所有组件
    All,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    intake: Arc<LeadIntakeService>,
    call_events: Arc<CallEventService>,
    sweep: Arc<SweepService>,
}

impl Application {
    /// 创建应用实例并装配所有组件
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        // 创建数据库连接池并执行迁移
        let db_pool = create_database_pool(&config).await?;

        // Repository实例
        let lead_repo: Arc<dyn LeadRepository> =
            Arc::new(SqliteLeadRepository::new(db_pool.clone()));
        let attempt_repo: Arc<dyn CallAttemptRepository> =
            Arc::new(SqliteCallAttemptRepository::new(db_pool.clone()));

        // 外部网关
        let voice_gateway: Arc<dyn VoiceDispatchGateway> = Arc::new(
            HttpVoiceGateway::new(config.voice_gateway.clone()).context("创建语音网关失败")?,
        );
        let message_gateway: Arc<dyn MessageGateway> = Arc::new(
            HttpMessageGateway::new(config.messaging.clone()).context("创建消息网关失败")?,
        );

        // 核心服务
        let intake = Arc::new(LeadIntakeService::new(
            lead_repo.clone(),
            attempt_repo.clone(),
            voice_gateway,
        ));
        let retry_scheduler = Arc::new(RetryScheduler::new(
            config.retry_policy.clone(),
            Arc::new(ThreadRandom),
        ));
        let call_events = Arc::new(CallEventService::new(
            lead_repo.clone(),
            attempt_repo.clone(),
            retry_scheduler,
        ));
        let sweep = Arc::new(SweepService::new(
            lead_repo.clone(),
            attempt_repo.clone(),
            message_gateway,
            intake.clone(),
            config.sweep.clone(),
            config.retry_policy.clone(),
            config.messaging.channel_prompt.clone(),
        ));

        Ok(Self {
            config,
            mode,
            lead_repo,
            attempt_repo,
            intake,
            call_events,
            sweep,
        })
    }

    /// 运行应用程序
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::Sweeper => self.run_sweeper(shutdown_rx).await,
            AppMode::All => self.run_all_components(shutdown_rx).await,
        }
    }

    /// 运行周期扫描
    async fn run_sweeper(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.sweep.enabled {
            info!("周期扫描未启用");
            return Ok(());
        }

        let runner = SweepRunner::new(self.sweep.clone(), &self.config.sweep);
        runner.run(shutdown_rx).await;

        info!("周期扫描已停止");
        Ok(())
    }

    /// 运行API服务器
    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动API服务器: {}", self.config.api.bind_address);

        let app = create_app(
            self.lead_repo.clone(),
            self.attempt_repo.clone(),
            self.intake.clone(),
            self.call_events.clone(),
            &self.config.api,
        );

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("API服务器运行失败: {}", e);
            }
        });

        let _ = shutdown_rx.recv().await;
        info!("API服务器收到关闭信号");

        server_handle.abort();
        info!("API服务器已停止");
        Ok(())
    }

    /// 运行所有组件
    async fn run_all_components(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");

        let mut handles = Vec::new();

        if self.config.sweep.enabled {
            let sweep = self.sweep.clone();
            let sweep_config = self.config.sweep.clone();
            let shutdown_rx = shutdown_rx.resubscribe();

            handles.push(tokio::spawn(async move {
                let runner = SweepRunner::new(sweep, &sweep_config);
                runner.run(shutdown_rx).await;
            }));
        }

        if self.config.api.enabled {
            let app = self.clone_for_mode(AppMode::Api);
            let shutdown_rx = shutdown_rx.resubscribe();

            handles.push(tokio::spawn(async move {
                if let Err(e) = app.run_api(shutdown_rx).await {
                    error!("API服务器运行失败: {}", e);
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        info!("所有组件已停止");
        Ok(())
    }

    fn clone_for_mode(&self, mode: AppMode) -> Self {
        Self {
            config: self.config.clone(),
            mode,
            lead_repo: self.lead_repo.clone(),
            attempt_repo: self.attempt_repo.clone(),
            intake: self.intake.clone(),
            call_events: self.call_events.clone(),
            sweep: self.sweep.clone(),
        }
    }
}

/// 创建数据库连接池并执行迁移
async fn create_database_pool(config: &AppConfig) -> Result<SqlitePool> {
    info!("连接数据库: {}", config.database.url);

    let options = SqliteConnectOptions::from_str(&config.database.url)
        .context("解析数据库URL失败")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.connection_timeout_seconds,
        ))
        .idle_timeout(std::time::Duration::from_secs(
            config.database.idle_timeout_seconds,
        ))
        .connect_with(options)
        .await
        .context("连接数据库失败")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("运行数据库迁移失败")?;

    info!("数据库连接成功");
    Ok(pool)
}
