fn main() -> anyhow::Result<()> {
    expense_assistant_lib::run()
}
