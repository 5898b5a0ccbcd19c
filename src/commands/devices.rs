use lockbell_transport::list_keyboards;

/// Print every keyboard node with a Caps Lock LED
pub fn run() -> anyhow::Result<()> {
    let keyboards = list_keyboards();
    if keyboards.is_empty() {
        println!("No keyboards with lock-key LEDs found (try running as root)");
        return Ok(());
    }

    for keyboard in keyboards {
        let states: Vec<String> = keyboard.states.iter().map(|s| s.to_string()).collect();
        println!("{}  {}", keyboard.path.display(), keyboard.name);
        if !states.is_empty() {
            println!("    {}", states.join(", "));
        }
    }
    Ok(())
}
